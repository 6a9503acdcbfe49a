use bson::Bson;
use serde_json::Value;

use crate::errors::CloudError;

/// Convert a serde_json::Value that must be an object into a bson::Document.
pub fn json_value_to_bson_document(val: &Value) -> Result<bson::Document, CloudError> {
    let obj = val.as_object().ok_or_else(|| CloudError::invalid("expected JSON object"))?;
    bson::Document::try_from(obj.clone()).map_err(|e| CloudError::invalid(e.to_string()))
}

/// Convert an arbitrary JSON value into a Bson value.
/// Integers that fit in 32 bits become Int32, larger ones Int64, the rest Double.
pub fn json_to_bson(val: &Value) -> Result<Bson, CloudError> {
    let mut wrapper = serde_json::Map::new();
    wrapper.insert("v".into(), val.clone());
    let mut doc =
        bson::Document::try_from(wrapper).map_err(|e| CloudError::invalid(e.to_string()))?;
    doc.remove("v").ok_or_else(|| CloudError::invalid("value lost during conversion"))
}

/// Convert a Bson value into plain JSON.
pub fn bson_to_json(val: &Bson) -> Result<Value, CloudError> {
    Ok(serde_json::to_value(val)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_bson_document_success() {
        let d = json_value_to_bson_document(&serde_json::json!({"a": 1, "b": "x"})).unwrap();
        assert_eq!(d.get_i32("a").unwrap(), 1);
        assert_eq!(d.get_str("b").unwrap(), "x");
    }

    #[test]
    fn json_to_bson_document_rejects_array() {
        let e = json_value_to_bson_document(&serde_json::json!([1, 2, 3])).unwrap_err();
        assert!(matches!(e, CloudError::InvalidArgument(_)));
    }

    #[test]
    fn scalar_conversion_keeps_shape() {
        assert_eq!(json_to_bson(&serde_json::json!(18)).unwrap(), Bson::Int32(18));
        assert_eq!(json_to_bson(&serde_json::json!("x")).unwrap(), Bson::String("x".into()));
        assert_eq!(bson_to_json(&Bson::Int32(18)).unwrap(), serde_json::json!(18));
        assert_eq!(bson_to_json(&Bson::Null).unwrap(), serde_json::Value::Null);
    }
}
