use proptest::collection::vec;
use proptest::prelude::*;
use cloudlite::geo::{
    GeoLineString, GeoMultiLineString, GeoMultiPoint, GeoMultiPolygon, GeoPoint, GeoPolygon,
    Geometry,
};

fn point() -> impl Strategy<Value = GeoPoint> {
    (-180.0f64..=180.0, -90.0f64..=90.0).prop_map(|(lng, lat)| GeoPoint::new(lng, lat).unwrap())
}

fn ring() -> impl Strategy<Value = GeoLineString> {
    vec(point(), 3..12).prop_map(|mut pts| {
        pts.push(pts[0]);
        GeoLineString::new(pts).unwrap()
    })
}

fn polygon() -> impl Strategy<Value = GeoPolygon> {
    vec(ring(), 1..4).prop_map(|r| GeoPolygon::new(r).unwrap())
}

fn geometry() -> impl Strategy<Value = Geometry> {
    prop_oneof![
        point().prop_map(Geometry::from),
        vec(point(), 1..10).prop_map(|p| Geometry::from(GeoMultiPoint::new(p).unwrap())),
        vec(point(), 2..10).prop_map(|p| Geometry::from(GeoLineString::new(p).unwrap())),
        vec(ring(), 1..4).prop_map(|l| Geometry::from(GeoMultiLineString::new(l).unwrap())),
        polygon().prop_map(Geometry::from),
        vec(polygon(), 1..3).prop_map(|p| Geometry::from(GeoMultiPolygon::new(p).unwrap())),
    ]
}

proptest! {
    #[test]
    fn prop_geojson_text_round_trips(g in geometry()) {
        let text = g.to_string();
        let back = Geometry::parse(&text).unwrap();
        prop_assert_eq!(back.to_string(), text);
        prop_assert_eq!(back, g);
    }

    #[test]
    fn prop_geometry_bson_keeps_type_tag(g in geometry()) {
        let b = bson::Bson::from(g.clone());
        let doc = b.as_document().unwrap();
        prop_assert_eq!(doc.get_str("type").unwrap(), g.kind());
    }

    #[test]
    fn prop_out_of_range_points_rejected(lng in 180.0001f64..1.0e6, lat in -90.0f64..=90.0) {
        prop_assert!(GeoPoint::new(lng, lat).is_err());
        prop_assert!(GeoPoint::new(-lng, lat).is_err());
    }
}
