//! Decoding of the JSON wire forms back into expression nodes.
//!
//! Accepts what the request encoder emits:
//! - `{ "field": literal }` is implicit `eq`
//! - `{ "field": { "operator": "gte", "operands": [18] } }` is a command
//! - `{ "$and": [...] }`, `{ "$or": [...] }`, `{ "$nor": [...] }`, `{ "$not": {...} }`
//!
//! A top-level object with several entries is an implicit AND of all entries.

use bson::Bson;
use serde_json::{Map, Value};

use super::logic::{ExpressionNode, LogicCommand};
use super::query::QueryCommand;
use super::types::{LogicOp, QueryOp, UpdateOp};
use super::update::{UpdateCommand, UpdateData, UpdateValue};
use crate::errors::CloudError;
use crate::utils::json::json_to_bson;

/// Parse a request condition into an expression tree.
pub fn parse_condition(value: &Value) -> Result<ExpressionNode, CloudError> {
    let obj =
        value.as_object().ok_or_else(|| CloudError::invalid("condition must be a JSON object"))?;
    let mut children = Vec::with_capacity(obj.len());
    for (key, v) in obj {
        if key.starts_with('$') {
            let op = LogicOp::from_wire_key(key)
                .ok_or_else(|| CloudError::invalid(format!("unknown top-level operator: {key}")))?;
            children.push(parse_logical(op, v)?);
        } else {
            children.push(parse_field(key, v)?);
        }
    }
    match children.len() {
        0 => Err(CloudError::invalid("empty condition object")),
        1 => Ok(children.remove(0)),
        _ => Ok(ExpressionNode::Logic(LogicCommand::new(LogicOp::And, children)?)),
    }
}

/// Parse an update payload.
pub fn parse_update(value: &Value) -> Result<UpdateData, CloudError> {
    let obj =
        value.as_object().ok_or_else(|| CloudError::invalid("update data must be a JSON object"))?;
    let mut data = UpdateData::new();
    for (field, v) in obj {
        let entry = match command_shape(v)? {
            Some((name, operands, bound)) => {
                let op = UpdateOp::parse(name).ok_or_else(|| {
                    CloudError::invalid(format!("unknown update operator: {name}"))
                })?;
                let cmd = UpdateCommand::new(op, operands, bound)?;
                UpdateValue::Command(cmd.set_field_name(field)?)
            }
            None => UpdateValue::Value(json_to_bson(v)?),
        };
        data.insert(field.clone(), entry);
    }
    Ok(data)
}

fn parse_logical(op: LogicOp, value: &Value) -> Result<ExpressionNode, CloudError> {
    let children = match (op, value) {
        (LogicOp::Not, Value::Object(_)) => vec![parse_condition(value)?],
        (LogicOp::Not, _) => return Err(CloudError::invalid("$not value must be an object")),
        (_, Value::Array(items)) => {
            items.iter().map(parse_condition).collect::<Result<Vec<_>, _>>()?
        }
        (_, _) => {
            return Err(CloudError::invalid(format!("{} value must be an array", op.wire_key())));
        }
    };
    Ok(ExpressionNode::Logic(LogicCommand::new(op, children)?))
}

fn parse_field(field: &str, value: &Value) -> Result<ExpressionNode, CloudError> {
    let Some((name, operands, bound)) = command_shape(value)? else {
        let literal = json_to_bson(value)?;
        let leaf = QueryCommand::new(QueryOp::Eq, vec![literal]).bind(field)?;
        return Ok(ExpressionNode::Comparison(leaf));
    };
    let op = QueryOp::parse(name)
        .ok_or_else(|| CloudError::invalid(format!("unknown field operator: {name}")))?;
    let node = QueryCommand::new(op, operands).bind(bound.as_deref().unwrap_or(field))?;
    Ok(ExpressionNode::Comparison(node.set_field_name(field)?))
}

type CommandParts<'a> = (&'a str, Vec<Bson>, Option<String>);

/// Recognize `{ "operator": <string>, "operands": [..], "fieldName"?: <string> }`.
/// Any other value is a literal.
fn command_shape(value: &Value) -> Result<Option<CommandParts<'_>>, CloudError> {
    let Value::Object(obj) = value else { return Ok(None) };
    if !is_command_object(obj) {
        return Ok(None);
    }
    let Some(Value::String(name)) = obj.get("operator") else {
        return Err(CloudError::invalid("operator must be a string"));
    };
    let Some(Value::Array(raw)) = obj.get("operands") else {
        return Err(CloudError::invalid("operands must be an array"));
    };
    let operands = raw.iter().map(json_to_bson).collect::<Result<Vec<_>, _>>()?;
    let bound = match obj.get("fieldName") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(CloudError::invalid("fieldName must be a string")),
    };
    Ok(Some((name.as_str(), operands, bound)))
}

fn is_command_object(obj: &Map<String, Value>) -> bool {
    obj.contains_key("operator")
        && obj.contains_key("operands")
        && obj.keys().all(|k| matches!(k.as_str(), "operator" | "operands" | "fieldName"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_field_is_eq() {
        let node = parse_condition(&json!({"name": "alice"})).unwrap();
        let ExpressionNode::Comparison(c) = node else { panic!("expected comparison") };
        assert_eq!(c.operator(), QueryOp::Eq);
        assert_eq!(c.field_name(), "name");
    }

    #[test]
    fn command_field_and_logic() {
        let node = parse_condition(&json!({
            "$or": [
                {"age": {"operator": "gte", "operands": [18]}},
                {"vip": true}
            ]
        }))
        .unwrap();
        let ExpressionNode::Logic(l) = node else { panic!("expected logic") };
        assert_eq!(l.operator(), LogicOp::Or);
        assert_eq!(l.operands().len(), 2);
    }

    #[test]
    fn conflicting_field_name_is_rejected() {
        let wire = json!({"age": {"operator": "gt", "operands": [1], "fieldName": "height"}});
        let err = parse_condition(&wire).unwrap_err();
        assert!(matches!(err, CloudError::FieldAlreadyBound { .. }));
    }

    #[test]
    fn unknown_operators_are_rejected() {
        assert!(parse_condition(&json!({"$xor": []})).is_err());
        assert!(parse_condition(&json!({"a": {"operator": "like", "operands": ["x"]}})).is_err());
        assert!(parse_condition(&json!({"$and": []})).is_err());
    }

    #[test]
    fn not_takes_single_object() {
        let node = parse_condition(&json!({"$not": {"a": 1}})).unwrap();
        let ExpressionNode::Logic(l) = node else { panic!("expected logic") };
        assert_eq!(l.operator(), LogicOp::Not);
        assert!(parse_condition(&json!({"$not": [{"a": 1}]})).is_err());
    }

    #[test]
    fn update_payload_mixes_literals_and_commands() {
        let wire = json!({"n": {"operator": "inc", "operands": [2]}, "tag": "x"});
        let data = parse_update(&wire).unwrap();
        assert!(data.has_commands());
        let cmds = data.into_commands().unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(cmds.iter().any(|c| c.operator() == UpdateOp::Inc && c.field_name() == Some("n")));
        let tag = cmds.iter().find(|c| c.field_name() == Some("tag")).unwrap();
        assert_eq!(tag.operator(), UpdateOp::Set);
    }

    #[test]
    fn update_arity_is_enforced_on_decode() {
        assert!(parse_update(&json!({"list": {"operator": "pop", "operands": [1]}})).is_err());
    }
}
