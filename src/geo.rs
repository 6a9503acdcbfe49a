//! GeoJSON geometry shapes accepted by the geo query operators.
//!
//! Every shape validates on construction and serializes to the standard
//! GeoJSON geometry object: `{"type": "Point", "coordinates": [lng, lat]}` and
//! the analogous nested coordinate arrays for the other five shapes.

use bson::Bson;
use serde::{Deserialize, Serialize};

use crate::errors::CloudError;

/// `[longitude, latitude]`
pub type Position = [f64; 2];

/// GeoJSON geometry object, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum GeoJson {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, CloudError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CloudError::invalid(format!("longitude out of range: {longitude}")));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CloudError::invalid(format!("latitude out of range: {latitude}")));
        }
        Ok(Self { longitude, latitude })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    fn position(&self) -> Position {
        [self.longitude, self.latitude]
    }

    fn from_position(p: Position) -> Result<Self, CloudError> {
        Self::new(p[0], p[1])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoMultiPoint {
    points: Vec<GeoPoint>,
}

impl GeoMultiPoint {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, CloudError> {
        if points.is_empty() {
            return Err(CloudError::invalid("MultiPoint needs at least one point"));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoLineString {
    points: Vec<GeoPoint>,
}

impl GeoLineString {
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, CloudError> {
        if points.len() < 2 {
            return Err(CloudError::invalid("LineString needs at least two points"));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    fn is_closed_ring(&self) -> bool {
        self.points.len() >= 4 && self.points.first() == self.points.last()
    }

    fn positions(&self) -> Vec<Position> {
        self.points.iter().map(GeoPoint::position).collect()
    }

    fn from_positions(ps: Vec<Position>) -> Result<Self, CloudError> {
        let points = ps.into_iter().map(GeoPoint::from_position).collect::<Result<Vec<_>, _>>()?;
        Self::new(points)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoMultiLineString {
    lines: Vec<GeoLineString>,
}

impl GeoMultiLineString {
    pub fn new(lines: Vec<GeoLineString>) -> Result<Self, CloudError> {
        if lines.is_empty() {
            return Err(CloudError::invalid("MultiLineString needs at least one line"));
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[GeoLineString] {
        &self.lines
    }
}

/// A polygon: the first ring is the exterior, the rest are holes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoPolygon {
    lines: Vec<GeoLineString>,
}

impl GeoPolygon {
    pub fn new(lines: Vec<GeoLineString>) -> Result<Self, CloudError> {
        if lines.is_empty() {
            return Err(CloudError::invalid("Polygon needs at least one ring"));
        }
        if let Some(i) = lines.iter().position(|l| !l.is_closed_ring()) {
            return Err(CloudError::invalid(format!(
                "Polygon ring {i} must be closed and have at least four points"
            )));
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[GeoLineString] {
        &self.lines
    }

    fn rings(&self) -> Vec<Vec<Position>> {
        self.lines.iter().map(GeoLineString::positions).collect()
    }

    fn from_rings(rings: Vec<Vec<Position>>) -> Result<Self, CloudError> {
        let lines =
            rings.into_iter().map(GeoLineString::from_positions).collect::<Result<Vec<_>, _>>()?;
        Self::new(lines)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoMultiPolygon {
    polygons: Vec<GeoPolygon>,
}

impl GeoMultiPolygon {
    pub fn new(polygons: Vec<GeoPolygon>) -> Result<Self, CloudError> {
        if polygons.is_empty() {
            return Err(CloudError::invalid("MultiPolygon needs at least one polygon"));
        }
        Ok(Self { polygons })
    }

    pub fn polygons(&self) -> &[GeoPolygon] {
        &self.polygons
    }
}

/// Any of the six recognized shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(GeoPoint),
    MultiPoint(GeoMultiPoint),
    LineString(GeoLineString),
    MultiLineString(GeoMultiLineString),
    Polygon(GeoPolygon),
    MultiPolygon(GeoMultiPolygon),
}

/// Shapes that enclose an area; the only ones `geoWithin` accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Area {
    Polygon(GeoPolygon),
    MultiPolygon(GeoMultiPolygon),
}

impl Geometry {
    #[must_use]
    pub fn to_geo_json(&self) -> GeoJson {
        match self {
            Geometry::Point(p) => GeoJson::Point(p.position()),
            Geometry::MultiPoint(m) => {
                GeoJson::MultiPoint(m.points.iter().map(GeoPoint::position).collect())
            }
            Geometry::LineString(l) => GeoJson::LineString(l.positions()),
            Geometry::MultiLineString(m) => {
                GeoJson::MultiLineString(m.lines.iter().map(GeoLineString::positions).collect())
            }
            Geometry::Polygon(p) => GeoJson::Polygon(p.rings()),
            Geometry::MultiPolygon(m) => {
                GeoJson::MultiPolygon(m.polygons.iter().map(GeoPolygon::rings).collect())
            }
        }
    }

    pub fn from_geo_json(json: GeoJson) -> Result<Self, CloudError> {
        Ok(match json {
            GeoJson::Point(p) => Geometry::Point(GeoPoint::from_position(p)?),
            GeoJson::MultiPoint(ps) => {
                let points =
                    ps.into_iter().map(GeoPoint::from_position).collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPoint(GeoMultiPoint::new(points)?)
            }
            GeoJson::LineString(ps) => Geometry::LineString(GeoLineString::from_positions(ps)?),
            GeoJson::MultiLineString(ls) => {
                let lines = ls
                    .into_iter()
                    .map(GeoLineString::from_positions)
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiLineString(GeoMultiLineString::new(lines)?)
            }
            GeoJson::Polygon(rings) => Geometry::Polygon(GeoPolygon::from_rings(rings)?),
            GeoJson::MultiPolygon(polys) => {
                let polygons =
                    polys.into_iter().map(GeoPolygon::from_rings).collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPolygon(GeoMultiPolygon::new(polygons)?)
            }
        })
    }

    /// Parse GeoJSON text into a validated shape.
    pub fn parse(text: &str) -> Result<Self, CloudError> {
        let json: GeoJson = serde_json::from_str(text)?;
        Self::from_geo_json(json)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(&self.to_geo_json()).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<Area> for Geometry {
    fn from(a: Area) -> Self {
        match a {
            Area::Polygon(p) => Geometry::Polygon(p),
            Area::MultiPolygon(m) => Geometry::MultiPolygon(m),
        }
    }
}

macro_rules! shape_conversions {
    ($($shape:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$shape> for Geometry {
                fn from(s: $shape) -> Self {
                    Geometry::$variant(s)
                }
            }

            impl From<$shape> for Bson {
                fn from(s: $shape) -> Self {
                    Bson::from(Geometry::$variant(s))
                }
            }
        )*
    };
}

shape_conversions! {
    GeoPoint => Point,
    GeoMultiPoint => MultiPoint,
    GeoLineString => LineString,
    GeoMultiLineString => MultiLineString,
    GeoPolygon => Polygon,
    GeoMultiPolygon => MultiPolygon,
}

impl From<GeoPolygon> for Area {
    fn from(p: GeoPolygon) -> Self {
        Area::Polygon(p)
    }
}

impl From<GeoMultiPolygon> for Area {
    fn from(m: GeoMultiPolygon) -> Self {
        Area::MultiPolygon(m)
    }
}

fn position_bson(p: Position) -> Bson {
    Bson::Array(vec![Bson::Double(p[0]), Bson::Double(p[1])])
}

fn positions_bson(ps: Vec<Position>) -> Bson {
    Bson::Array(ps.into_iter().map(position_bson).collect())
}

fn rings_bson(rings: Vec<Vec<Position>>) -> Bson {
    Bson::Array(rings.into_iter().map(positions_bson).collect())
}

impl From<Geometry> for Bson {
    fn from(g: Geometry) -> Self {
        let kind = g.kind();
        let coordinates = match g.to_geo_json() {
            GeoJson::Point(p) => position_bson(p),
            GeoJson::MultiPoint(ps) | GeoJson::LineString(ps) => positions_bson(ps),
            GeoJson::MultiLineString(ls) | GeoJson::Polygon(ls) => rings_bson(ls),
            GeoJson::MultiPolygon(polys) => {
                Bson::Array(polys.into_iter().map(rings_bson).collect())
            }
        };
        Bson::Document(bson::doc! { "type": kind, "coordinates": coordinates })
    }
}

impl From<Area> for Bson {
    fn from(a: Area) -> Self {
        Bson::from(Geometry::from(a))
    }
}
