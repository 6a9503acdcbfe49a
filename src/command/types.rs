use crate::utils::wire::wire_enum;

// Field path limits
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_PATH_LEN: usize = 1024;

wire_enum! {
    pub enum QueryOp {
        Eq => "eq",
        Neq => "neq",
        Gt => "gt",
        Gte => "gte",
        Lt => "lt",
        Lte => "lte",
        In => "in",
        Nin => "nin",
        GeoNear => "geoNear",
        GeoWithin => "geoWithin",
        GeoIntersects => "geoIntersects",
    }
}

wire_enum! {
    pub enum LogicOp {
        And => "and",
        Or => "or",
        // Reserved: accepted from the wire, never emitted by a builder.
        Not => "not",
        Nor => "nor",
    }
}

impl LogicOp {
    /// Key used for this operator in the request condition encoding.
    pub fn wire_key(self) -> &'static str {
        match self {
            LogicOp::And => "$and",
            LogicOp::Or => "$or",
            LogicOp::Not => "$not",
            LogicOp::Nor => "$nor",
        }
    }

    pub fn from_wire_key(key: &str) -> Option<Self> {
        key.strip_prefix('$').and_then(Self::parse)
    }
}

wire_enum! {
    pub enum UpdateOp {
        Set => "set",
        Remove => "remove",
        Inc => "inc",
        Mul => "mul",
        Push => "push",
        Pop => "pop",
        Shift => "shift",
        Unshift => "unshift",
    }
}

/// How many operands an update operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Any,
}

impl UpdateOp {
    pub fn arity(self) -> Arity {
        match self {
            UpdateOp::Remove | UpdateOp::Pop | UpdateOp::Shift => Arity::None,
            UpdateOp::Set | UpdateOp::Inc | UpdateOp::Mul => Arity::One,
            UpdateOp::Push | UpdateOp::Unshift => Arity::Any,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, UpdateOp::Inc | UpdateOp::Mul)
    }
}

/// Validate a field path before it is bound to a node.
pub(crate) fn validate_field_name(name: &str) -> Result<(), crate::errors::CloudError> {
    use crate::errors::CloudError;
    if name.is_empty() {
        return Err(CloudError::invalid("field name must not be empty"));
    }
    if name.len() > MAX_PATH_LEN {
        return Err(CloudError::invalid(format!("field name longer than {MAX_PATH_LEN} bytes")));
    }
    if name.starts_with('$') {
        return Err(CloudError::invalid(format!("field name must not start with `$`: {name}")));
    }
    let mut depth = 0usize;
    for seg in name.split('.') {
        depth += 1;
        if seg.is_empty() {
            return Err(CloudError::invalid(format!("empty path segment in `{name}`")));
        }
    }
    if depth > MAX_PATH_DEPTH {
        return Err(CloudError::invalid(format!("field path deeper than {MAX_PATH_DEPTH}: {name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_names_match_serde() {
        for &op in QueryOp::ALL {
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, serde_json::Value::String(op.as_str().into()));
            assert_eq!(serde_json::from_value::<QueryOp>(json).unwrap(), op);
        }
        for &op in UpdateOp::ALL {
            assert_eq!(UpdateOp::parse(op.as_str()), Some(op));
        }
        assert_eq!(LogicOp::from_wire_key("$nor"), Some(LogicOp::Nor));
        assert_eq!(LogicOp::from_wire_key("and"), None);
        assert!(serde_json::from_value::<UpdateOp>(serde_json::json!("append")).is_err());
    }

    #[test]
    fn field_names_are_validated() {
        assert!(validate_field_name("profile.age").is_ok());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name("$where").is_err());
        assert!(validate_field_name("a..b").is_err());
        let deep = vec!["x"; MAX_PATH_DEPTH + 1].join(".");
        assert!(validate_field_name(&deep).is_err());
    }
}
