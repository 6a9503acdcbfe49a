use bson::{Bson, Document};
use serde::Serialize;

use super::query::{BoundQuery, FieldExpr, QueryCommand};
use super::types::{LogicOp, QueryOp};
use crate::errors::CloudError;
use crate::geo::{GeoPoint, Geometry};
use crate::values::{DbRegExp, ServerDate};

/// A node of a document-level filter tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExpressionNode {
    Comparison(BoundQuery),
    Logic(LogicCommand),
}

/// `and` / `or` over document-level nodes. Operands are never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicCommand {
    operator: LogicOp,
    operands: Vec<ExpressionNode>,
}

impl LogicCommand {
    pub(crate) fn new(
        operator: LogicOp,
        operands: Vec<ExpressionNode>,
    ) -> Result<Self, CloudError> {
        if operands.is_empty() {
            return Err(CloudError::invalid(format!("`{operator}` needs at least one operand")));
        }
        if operator == LogicOp::Not && operands.len() != 1 {
            return Err(CloudError::invalid("`not` takes exactly one operand"));
        }
        Ok(Self { operator, operands })
    }

    pub(crate) fn combine<I, C>(operator: LogicOp, exprs: I) -> Result<Self, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        let operands =
            exprs.into_iter().map(|c| to_expression(c.into())).collect::<Result<Vec<_>, _>>()?;
        Self::new(operator, operands)
    }

    pub fn operator(&self) -> LogicOp {
        self.operator
    }

    pub fn operands(&self) -> &[ExpressionNode] {
        &self.operands
    }

    /// `self AND exprs...`, as a new node with `self` as the first operand.
    pub fn and<I, C>(self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        ExpressionNode::Logic(self).and(exprs)
    }

    pub fn or<I, C>(self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        ExpressionNode::Logic(self).or(exprs)
    }
}

impl ExpressionNode {
    pub fn and<I, C>(self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        self.combine(LogicOp::And, exprs)
    }

    pub fn or<I, C>(self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        self.combine(LogicOp::Or, exprs)
    }

    fn combine<I, C>(self, operator: LogicOp, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        let mut operands = vec![self];
        for c in exprs {
            operands.push(to_expression(c.into())?);
        }
        LogicCommand::new(operator, operands)
    }
}

impl From<BoundQuery> for ExpressionNode {
    fn from(q: BoundQuery) -> Self {
        ExpressionNode::Comparison(q)
    }
}

impl From<LogicCommand> for ExpressionNode {
    fn from(l: LogicCommand) -> Self {
        ExpressionNode::Logic(l)
    }
}

/// Right-hand side of one entry of a raw condition map.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldCondition {
    /// Implicit equality.
    Value(Bson),
    Expr(FieldExpr),
}

impl From<QueryCommand> for FieldCondition {
    fn from(q: QueryCommand) -> Self {
        FieldCondition::Expr(FieldExpr::Query(q))
    }
}

impl From<FieldExpr> for FieldCondition {
    fn from(e: FieldExpr) -> Self {
        FieldCondition::Expr(e)
    }
}

macro_rules! literal_field_condition {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FieldCondition {
                fn from(v: $t) -> Self {
                    FieldCondition::Value(Bson::from(v))
                }
            }
        )*
    };
}

literal_field_condition!(
    Bson, bool, i32, i64, f64, &str, String, Document, Vec<Bson>, GeoPoint, Geometry, ServerDate,
    DbRegExp,
);

/// Raw condition map: field name to literal (implicit `eq`) or field expression.
/// Entries keep insertion order; re-inserting a field replaces its value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap {
    entries: Vec<(String, FieldCondition)>,
}

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, cond: impl Into<FieldCondition>) -> Self {
        self.insert(name, cond);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, cond: impl Into<FieldCondition>) {
        let name = name.into();
        let cond = cond.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = cond,
            None => self.entries.push((name, cond)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldCondition)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Document> for FieldMap {
    fn from(doc: Document) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in doc {
            map.insert(k, FieldCondition::Value(v));
        }
        map
    }
}

/// Build a [`FieldMap`] from `"field" => value` pairs.
///
/// ```
/// use cloudlite::{fields, command::Command};
/// let cmd = Command;
/// let cond = fields! { "age" => cmd.gte(18), "city" => "Shenzhen" };
/// assert_eq!(cond.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => { $crate::command::FieldMap::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut __m = $crate::command::FieldMap::new();
        $( __m.insert($name, $value); )+
        __m
    }};
}

/// Argument accepted by `where` and the `and` / `or` combinators.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Fields(FieldMap),
    Expr(ExpressionNode),
}

impl From<FieldMap> for Condition {
    fn from(m: FieldMap) -> Self {
        Condition::Fields(m)
    }
}

impl From<Document> for Condition {
    fn from(doc: Document) -> Self {
        Condition::Fields(FieldMap::from(doc))
    }
}

impl From<ExpressionNode> for Condition {
    fn from(n: ExpressionNode) -> Self {
        Condition::Expr(n)
    }
}

impl From<LogicCommand> for Condition {
    fn from(l: LogicCommand) -> Self {
        Condition::Expr(ExpressionNode::Logic(l))
    }
}

impl From<BoundQuery> for Condition {
    fn from(q: BoundQuery) -> Self {
        Condition::Expr(ExpressionNode::Comparison(q))
    }
}

/// Normalize a condition into an expression tree.
///
/// A raw map becomes one leaf per key; several keys are AND-combined in
/// insertion order. Expression trees pass through unchanged.
pub fn to_expression(cond: Condition) -> Result<ExpressionNode, CloudError> {
    let map = match cond {
        Condition::Expr(node) => return Ok(node),
        Condition::Fields(map) => map,
    };
    let mut leaves = Vec::with_capacity(map.len());
    for (name, fc) in map.entries {
        let node = match fc {
            FieldCondition::Value(v) => {
                ExpressionNode::Comparison(QueryCommand::new(QueryOp::Eq, vec![v]).bind(name)?)
            }
            FieldCondition::Expr(e) => e.bind(&name)?,
        };
        leaves.push(node);
    }
    match leaves.len() {
        0 => Err(CloudError::invalid("condition map must not be empty")),
        1 => Ok(leaves.remove(0)),
        _ => Ok(ExpressionNode::Logic(LogicCommand::new(LogicOp::And, leaves)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn eq(field: &str, v: i32) -> ExpressionNode {
        let leaf = QueryCommand::new(QueryOp::Eq, vec![Bson::Int32(v)]).bind(field).unwrap();
        ExpressionNode::Comparison(leaf)
    }

    #[test]
    fn single_key_map_is_a_leaf() {
        assert_eq!(to_expression(doc! {"x": 1}.into()).unwrap(), eq("x", 1));
    }

    #[test]
    fn multi_key_map_is_and_in_order() {
        let node = to_expression(doc! {"x": 1, "y": 2}.into()).unwrap();
        let expected = LogicCommand::new(LogicOp::And, vec![eq("x", 1), eq("y", 2)]).unwrap();
        assert_eq!(node, ExpressionNode::Logic(expected));
    }

    #[test]
    fn empty_map_is_rejected() {
        assert!(to_expression(FieldMap::new().into()).is_err());
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let m = FieldMap::new().field("a", 1).field("b", 2).field("a", 3);
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.iter().next().unwrap().1, &FieldCondition::Value(Bson::Int32(3)));
    }

    #[test]
    fn node_and_keeps_self_first() {
        let combined = eq("a", 1).and([doc! {"b": 2}]).unwrap();
        assert_eq!(combined.operands(), &[eq("a", 1), eq("b", 2)]);
    }
}
