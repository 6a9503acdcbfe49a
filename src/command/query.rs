use bson::{Bson, Document};
use serde::Serialize;

use super::logic::{ExpressionNode, LogicCommand};
use super::types::{LogicOp, QueryOp, validate_field_name};
use crate::errors::CloudError;
use crate::geo::{Area, GeoPoint, Geometry};

/// A comparison that has not been attached to a field yet.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCommand {
    operator: QueryOp,
    operands: Vec<Bson>,
}

/// A comparison bound to a field path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundQuery {
    operator: QueryOp,
    field_name: String,
    operands: Vec<Bson>,
}

/// Field-level expression: a comparison, or `and`/`or` over field-level
/// expressions that all bind to the same field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr {
    Query(QueryCommand),
    Logic { operator: LogicOp, operands: Vec<FieldExpr> },
}

impl QueryCommand {
    pub(crate) fn new(operator: QueryOp, operands: Vec<Bson>) -> Self {
        Self { operator, operands }
    }

    pub fn operator(&self) -> QueryOp {
        self.operator
    }

    pub fn operands(&self) -> &[Bson] {
        &self.operands
    }

    /// Attach this comparison to `field`.
    pub fn bind(self, field: impl Into<String>) -> Result<BoundQuery, CloudError> {
        let field_name = field.into();
        validate_field_name(&field_name)?;
        Ok(BoundQuery { operator: self.operator, field_name, operands: self.operands })
    }

    #[must_use]
    pub fn and(self, other: impl Into<FieldExpr>) -> FieldExpr {
        FieldExpr::from(self).and(other)
    }

    #[must_use]
    pub fn or(self, other: impl Into<FieldExpr>) -> FieldExpr {
        FieldExpr::from(self).or(other)
    }
}

impl BoundQuery {
    pub fn operator(&self) -> QueryOp {
        self.operator
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn operands(&self) -> &[Bson] {
        &self.operands
    }

    /// Returns an equivalent node bound to `name`.
    ///
    /// Binding the name the node already carries is a no-op; any other name is
    /// rejected with [`CloudError::FieldAlreadyBound`].
    pub fn set_field_name(&self, name: &str) -> Result<BoundQuery, CloudError> {
        if self.field_name == name {
            return Ok(self.clone());
        }
        Err(CloudError::FieldAlreadyBound {
            bound: self.field_name.clone(),
            requested: name.to_string(),
        })
    }

    /// Drop the binding, recovering the anonymous comparison.
    #[must_use]
    pub fn unbind(self) -> QueryCommand {
        QueryCommand { operator: self.operator, operands: self.operands }
    }
}

impl FieldExpr {
    #[must_use]
    pub fn and(self, other: impl Into<FieldExpr>) -> FieldExpr {
        FieldExpr::Logic { operator: LogicOp::And, operands: vec![self, other.into()] }
    }

    #[must_use]
    pub fn or(self, other: impl Into<FieldExpr>) -> FieldExpr {
        FieldExpr::Logic { operator: LogicOp::Or, operands: vec![self, other.into()] }
    }

    /// Bind every comparison in the tree to `field`, producing a document-level tree.
    pub fn bind(self, field: &str) -> Result<ExpressionNode, CloudError> {
        match self {
            FieldExpr::Query(q) => Ok(ExpressionNode::Comparison(q.bind(field)?)),
            FieldExpr::Logic { operator, operands } => {
                let children =
                    operands.into_iter().map(|c| c.bind(field)).collect::<Result<Vec<_>, _>>()?;
                Ok(ExpressionNode::Logic(LogicCommand::new(operator, children)?))
            }
        }
    }
}

impl From<QueryCommand> for FieldExpr {
    fn from(q: QueryCommand) -> Self {
        FieldExpr::Query(q)
    }
}

// `cmd.gt(1).lt(5)` reads as `cmd.gt(1).and(cmd.lt(5))`.
macro_rules! chained_comparisons {
    ($ty:ty) => {
        impl $ty {
            #[must_use]
            pub fn eq(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Eq, vec![value.into()]))
            }
            #[must_use]
            pub fn neq(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Neq, vec![value.into()]))
            }
            #[must_use]
            pub fn gt(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Gt, vec![value.into()]))
            }
            #[must_use]
            pub fn gte(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Gte, vec![value.into()]))
            }
            #[must_use]
            pub fn lt(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Lt, vec![value.into()]))
            }
            #[must_use]
            pub fn lte(self, value: impl Into<Bson>) -> FieldExpr {
                self.and(QueryCommand::new(QueryOp::Lte, vec![value.into()]))
            }
        }
    };
}

chained_comparisons!(QueryCommand);
chained_comparisons!(FieldExpr);

#[derive(Debug, Clone, PartialEq)]
pub struct GeoNearOptions {
    pub geometry: GeoPoint,
    /// Meters.
    pub max_distance: Option<f64>,
    /// Meters.
    pub min_distance: Option<f64>,
}

impl GeoNearOptions {
    #[must_use]
    pub fn new(geometry: GeoPoint) -> Self {
        Self { geometry, max_distance: None, min_distance: None }
    }

    #[must_use]
    pub fn max_distance(mut self, meters: f64) -> Self {
        self.max_distance = Some(meters);
        self
    }

    #[must_use]
    pub fn min_distance(mut self, meters: f64) -> Self {
        self.min_distance = Some(meters);
        self
    }

    pub(crate) fn into_operand(self) -> Result<Bson, CloudError> {
        for (name, d) in [("maxDistance", self.max_distance), ("minDistance", self.min_distance)] {
            if let Some(d) = d
                && (!d.is_finite() || d < 0.0)
            {
                return Err(CloudError::invalid(format!("{name} must be a non-negative number")));
            }
        }
        if let (Some(max), Some(min)) = (self.max_distance, self.min_distance)
            && min > max
        {
            return Err(CloudError::invalid("minDistance must not exceed maxDistance"));
        }
        let mut doc = Document::new();
        doc.insert("geometry", Bson::from(self.geometry));
        if let Some(max) = self.max_distance {
            doc.insert("maxDistance", max);
        }
        if let Some(min) = self.min_distance {
            doc.insert("minDistance", min);
        }
        Ok(Bson::Document(doc))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoWithinOptions {
    pub geometry: Area,
}

impl GeoWithinOptions {
    pub fn new(geometry: impl Into<Area>) -> Self {
        Self { geometry: geometry.into() }
    }

    pub(crate) fn into_operand(self) -> Bson {
        Bson::Document(bson::doc! { "geometry": Bson::from(self.geometry) })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoIntersectsOptions {
    pub geometry: Geometry,
}

impl GeoIntersectsOptions {
    pub fn new(geometry: impl Into<Geometry>) -> Self {
        Self { geometry: geometry.into() }
    }

    pub(crate) fn into_operand(self) -> Bson {
        Bson::Document(bson::doc! { "geometry": Bson::from(self.geometry) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_query_serializes_with_field_name() {
        let q = QueryCommand::new(QueryOp::Gte, vec![Bson::Int32(18)]).bind("age").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        assert_eq!(json, r#"{"operator":"gte","fieldName":"age","operands":[18]}"#);
    }

    #[test]
    fn rebinding_same_name_is_idempotent() {
        let q = QueryCommand::new(QueryOp::Eq, vec![Bson::Int32(1)]).bind("a").unwrap();
        assert_eq!(q.set_field_name("a").unwrap(), q);
    }

    #[test]
    fn rebinding_other_name_conflicts() {
        let q = QueryCommand::new(QueryOp::Eq, vec![Bson::Int32(1)]).bind("a").unwrap();
        match q.set_field_name("b") {
            Err(CloudError::FieldAlreadyBound { bound, requested }) => {
                assert_eq!(bound, "a");
                assert_eq!(requested, "b");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn chained_comparison_binds_every_leaf() {
        let expr = QueryCommand::new(QueryOp::Gt, vec![Bson::Int32(1)]).lt(5);
        let node = expr.bind("n").unwrap();
        let ExpressionNode::Logic(l) = node else { panic!("expected logic node") };
        assert_eq!(l.operator(), LogicOp::And);
        assert_eq!(l.operands().len(), 2);
        for child in l.operands() {
            let ExpressionNode::Comparison(c) = child else { panic!("expected comparison") };
            assert_eq!(c.field_name(), "n");
        }
    }

    #[test]
    fn geo_near_rejects_inverted_range() {
        let opts = GeoNearOptions::new(GeoPoint::new(0.0, 0.0).unwrap())
            .max_distance(10.0)
            .min_distance(20.0);
        assert!(opts.into_operand().is_err());
    }
}
