//! Query and update expression builder.
//!
//! [`Command`] is the stateless namespace that creates expression nodes.
//! Comparisons start unbound ([`QueryCommand`]) and are bound to a field when
//! they are placed in a condition map; raw maps and expression trees are both
//! accepted wherever a condition is expected ([`Condition`]).

mod logic;
pub mod parse;
mod query;
mod types;
mod update;

use bson::Bson;

use crate::errors::CloudError;

pub use logic::{Condition, ExpressionNode, FieldCondition, FieldMap, LogicCommand, to_expression};
pub use query::{
    BoundQuery, FieldExpr, GeoIntersectsOptions, GeoNearOptions, GeoWithinOptions, QueryCommand,
};
pub use types::{Arity, LogicOp, QueryOp, UpdateOp};
pub(crate) use types::validate_field_name;
pub use update::{Number, UpdateCommand, UpdateData, UpdateValue};

/// Factory for query, logic and update expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Command;

fn comparison(op: QueryOp, value: impl Into<Bson>) -> QueryCommand {
    QueryCommand::new(op, vec![value.into()])
}

impl Command {
    pub fn eq(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Eq, value)
    }

    pub fn neq(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Neq, value)
    }

    pub fn gt(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Gt, value)
    }

    pub fn gte(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Gte, value)
    }

    pub fn lt(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Lt, value)
    }

    pub fn lte(&self, value: impl Into<Bson>) -> QueryCommand {
        comparison(QueryOp::Lte, value)
    }

    /// Field value is one of `values`. The set travels as a single array operand.
    pub fn in_<I, V>(&self, values: I) -> QueryCommand
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        comparison(QueryOp::In, values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    pub fn nin<I, V>(&self, values: I) -> QueryCommand
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        comparison(QueryOp::Nin, values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    pub fn geo_near(&self, options: GeoNearOptions) -> Result<QueryCommand, CloudError> {
        Ok(QueryCommand::new(QueryOp::GeoNear, vec![options.into_operand()?]))
    }

    pub fn geo_within(&self, options: GeoWithinOptions) -> QueryCommand {
        QueryCommand::new(QueryOp::GeoWithin, vec![options.into_operand()])
    }

    pub fn geo_intersects(&self, options: GeoIntersectsOptions) -> QueryCommand {
        QueryCommand::new(QueryOp::GeoIntersects, vec![options.into_operand()])
    }

    /// AND of the given conditions, in order. Raw maps are normalized first.
    pub fn and<I, C>(&self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        LogicCommand::combine(LogicOp::And, exprs)
    }

    pub fn or<I, C>(&self, exprs: I) -> Result<LogicCommand, CloudError>
    where
        I: IntoIterator<Item = C>,
        C: Into<Condition>,
    {
        LogicCommand::combine(LogicOp::Or, exprs)
    }

    pub fn set(&self, value: impl Into<Bson>) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Set, vec![value.into()])
    }

    pub fn remove(&self) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Remove, Vec::new())
    }

    pub fn inc(&self, value: impl Into<Number>) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Inc, vec![Bson::from(value.into())])
    }

    pub fn mul(&self, value: impl Into<Number>) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Mul, vec![Bson::from(value.into())])
    }

    /// Append `values`; an empty list is a valid no-op.
    pub fn push<I, V>(&self, values: I) -> UpdateCommand
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        UpdateCommand::unbound(UpdateOp::Push, values.into_iter().map(Into::into).collect())
    }

    pub fn pop(&self) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Pop, Vec::new())
    }

    pub fn shift(&self) -> UpdateCommand {
        UpdateCommand::unbound(UpdateOp::Shift, Vec::new())
    }

    /// Prepend `values`; an empty list is a valid no-op.
    pub fn unshift<I, V>(&self, values: I) -> UpdateCommand
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        UpdateCommand::unbound(UpdateOp::Unshift, values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const CMD: Command = Command;

    #[test]
    fn every_comparison_serializes_uniformly() {
        let cases = [
            (CMD.eq(7), "eq"),
            (CMD.neq(7), "neq"),
            (CMD.gt(7), "gt"),
            (CMD.gte(7), "gte"),
            (CMD.lt(7), "lt"),
            (CMD.lte(7), "lte"),
        ];
        for (q, name) in cases {
            let json = serde_json::to_value(q.bind("f").unwrap()).unwrap();
            let expected = serde_json::json!({"operator": name, "fieldName": "f", "operands": [7]});
            assert_eq!(json, expected);
        }
    }

    #[test]
    fn in_keeps_the_set_as_one_operand() {
        let q = CMD.in_(["a", "b"]);
        assert_eq!(q.operands(), &[Bson::Array(vec!["a".into(), "b".into()])]);
    }

    #[test]
    fn and_preserves_order_without_flattening() {
        let a = CMD.and([doc! {"x": 1}]).unwrap();
        let b = CMD.or([doc! {"y": 2}]).unwrap();
        let top = CMD.and([Condition::from(a.clone()), Condition::from(b.clone())]).unwrap();
        assert_eq!(top.operator(), LogicOp::And);
        assert_eq!(top.operands(), &[ExpressionNode::Logic(a), ExpressionNode::Logic(b)]);
    }

    #[test]
    fn and_without_operands_is_rejected() {
        assert!(CMD.and(Vec::<Condition>::new()).is_err());
    }

    #[test]
    fn push_and_unshift_accept_nothing() {
        assert!(CMD.push(Vec::<Bson>::new()).operands().is_empty());
        assert!(CMD.unshift(Vec::<Bson>::new()).operands().is_empty());
    }

    #[test]
    fn no_operand_updates() {
        for c in [CMD.remove(), CMD.pop(), CMD.shift()] {
            assert!(c.operands().is_empty());
            assert_eq!(c.field_name(), None);
        }
    }
}
