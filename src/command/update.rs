use bson::{Bson, Document};
use serde::Serialize;

use super::types::{Arity, UpdateOp, validate_field_name};
use crate::errors::CloudError;
use crate::geo::{GeoPoint, Geometry};
use crate::values::{DbRegExp, ServerDate};

/// A mutation of one field. The field name may be filled in later by the
/// enclosing document update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommand {
    operator: UpdateOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_name: Option<String>,
    operands: Vec<Bson>,
}

/// Numeric operand for `inc` / `mul`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i32),
    Long(i64),
    Double(f64),
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Int(v)
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Long(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Double(v)
    }
}

impl From<u32> for Number {
    fn from(v: u32) -> Self {
        Number::Long(i64::from(v))
    }
}

impl From<f32> for Number {
    fn from(v: f32) -> Self {
        Number::Double(f64::from(v))
    }
}

impl From<Number> for Bson {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(v) => Bson::Int32(v),
            Number::Long(v) => Bson::Int64(v),
            Number::Double(v) => Bson::Double(v),
        }
    }
}

fn is_number(b: &Bson) -> bool {
    matches!(b, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

impl UpdateCommand {
    /// Build an update from its `(operator, operands, field_name)` triple,
    /// checking operand arity and, for `inc`/`mul`, that the operand is numeric.
    pub fn new(
        operator: UpdateOp,
        operands: Vec<Bson>,
        field_name: Option<String>,
    ) -> Result<Self, CloudError> {
        let op = operator.as_str();
        match (operator.arity(), operands.len()) {
            (Arity::None, 0) | (Arity::One, 1) | (Arity::Any, _) => {}
            (Arity::None, n) => {
                return Err(CloudError::invalid(format!("`{op}` takes no operands, got {n}")));
            }
            (Arity::One, n) => {
                return Err(CloudError::invalid(format!(
                    "`{op}` takes exactly one operand, got {n}"
                )));
            }
        }
        if operator.is_numeric() && !operands.iter().all(is_number) {
            return Err(CloudError::invalid(format!("`{op}` operand must be a number")));
        }
        if let Some(name) = &field_name {
            validate_field_name(name)?;
        }
        Ok(Self { operator, field_name, operands })
    }

    /// Constructor for the builder methods, whose signatures already fix arity.
    pub(crate) fn unbound(operator: UpdateOp, operands: Vec<Bson>) -> Self {
        Self { operator, field_name: None, operands }
    }

    pub fn operator(&self) -> UpdateOp {
        self.operator
    }

    pub fn operands(&self) -> &[Bson] {
        &self.operands
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    /// Returns an equivalent command bound to `name`. Idempotent for the name
    /// already bound; any other name fails with [`CloudError::FieldAlreadyBound`].
    pub fn set_field_name(&self, name: &str) -> Result<UpdateCommand, CloudError> {
        match &self.field_name {
            Some(bound) if bound == name => Ok(self.clone()),
            Some(bound) => Err(CloudError::FieldAlreadyBound {
                bound: bound.clone(),
                requested: name.to_string(),
            }),
            None => {
                validate_field_name(name)?;
                Ok(Self { field_name: Some(name.to_string()), ..self.clone() })
            }
        }
    }
}

/// Right-hand side of one entry of an update payload.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    /// Implicit `set`.
    Value(Bson),
    Command(UpdateCommand),
}

impl From<UpdateCommand> for UpdateValue {
    fn from(c: UpdateCommand) -> Self {
        UpdateValue::Command(c)
    }
}

macro_rules! literal_update_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for UpdateValue {
                fn from(v: $t) -> Self {
                    UpdateValue::Value(Bson::from(v))
                }
            }
        )*
    };
}

literal_update_value!(
    Bson, bool, i32, i64, f64, &str, String, Document, Vec<Bson>, GeoPoint, Geometry, ServerDate,
    DbRegExp,
);

/// Update payload: field name to literal or update command, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateData {
    entries: Vec<(String, UpdateValue)>,
}

impl UpdateData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<UpdateValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<UpdateValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_commands(&self) -> bool {
        self.entries.iter().any(|(_, v)| matches!(v, UpdateValue::Command(_)))
    }

    /// Bind every entry to its field; literals become `set` commands.
    pub fn into_commands(self) -> Result<Vec<UpdateCommand>, CloudError> {
        if self.entries.is_empty() {
            return Err(CloudError::invalid("update data must not be empty"));
        }
        self.entries
            .into_iter()
            .map(|(name, v)| match v {
                UpdateValue::Value(b) => {
                    UpdateCommand::unbound(UpdateOp::Set, vec![b]).set_field_name(&name)
                }
                UpdateValue::Command(c) => c.set_field_name(&name),
            })
            .collect()
    }

    /// The payload as a plain document. Fails if any entry is an update command.
    pub fn into_literal_document(self) -> Result<Document, CloudError> {
        let mut doc = Document::new();
        for (name, v) in self.entries {
            match v {
                UpdateValue::Value(b) => {
                    doc.insert(name, b);
                }
                UpdateValue::Command(c) => {
                    return Err(CloudError::invalid(format!(
                        "field `{name}` carries a `{}` command; only literal values are allowed",
                        c.operator()
                    )));
                }
            }
        }
        Ok(doc)
    }
}

impl From<Document> for UpdateData {
    fn from(doc: Document) -> Self {
        let mut data = UpdateData::new();
        for (k, v) in doc {
            data.insert(k, UpdateValue::Value(v));
        }
        data
    }
}
