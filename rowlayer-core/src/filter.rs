//! Compilation of dynamic filter maps into predicate clauses.
//!
//! A filter specification is a plain [`Document`] mapping field names to
//! constraints, so callers can build one with the `doc!` macro:
//!
//! ```ignore
//! use bson::doc;
//!
//! let filters = doc! {
//!     "age": { ">=": 18 },
//!     "department": ["Engineering", "Product"],
//!     "email": { "not": null },
//! };
//! ```
//!
//! Each entry compiles to one predicate clause:
//!
//! - a scalar value compiles to an equality clause
//! - an array compiles to a membership (`IN`) clause
//! - `null` compiles to an `IS NULL` clause
//! - a nested document is an operator map over [`FILTER_OPERATORS`]
//!
//! All recognized keys of an operator map are applied conjunctively, in the
//! fixed order of [`FILTER_OPERATORS`]; a key outside that set fails with
//! [`StoreError::InvalidFilterOperator`] and is never reinterpreted as
//! equality. Field names are validated against the table's registry.
//!
//! The compiler returns one clause per field and does not combine them;
//! callers AND the clauses together.

use bson::{Bson, Document};

use crate::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp},
    schema::TableSchema,
};

/// Operator keys recognized in a filter operator map, in evaluation order.
pub const FILTER_OPERATORS: &[&str] =
    &["not", ">=", "<=", ">", "<", "between", "not_in", "like", "ilike"];

/// Compiles filter specifications against one table's registry.
pub struct FilterCompiler<'a> {
    schema: &'a TableSchema,
}

impl<'a> FilterCompiler<'a> {
    /// Creates a compiler for the given table schema.
    pub fn new(schema: &'a TableSchema) -> Self {
        Self { schema }
    }

    /// Compiles a filter specification into predicate clauses, one per field.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownField`] for a field the table does not
    /// declare, [`StoreError::InvalidFilterOperator`] for an operator map with
    /// an unrecognized key, and [`StoreError::InvalidOperand`] for a
    /// recognized operator with an unusable operand.
    pub fn compile(&self, filters: &Document) -> StoreResult<Vec<Expr>> {
        let mut clauses = Vec::with_capacity(filters.len());

        for (field, value) in filters {
            if !self.schema.has_field(field) {
                return Err(StoreError::UnknownField {
                    table: self.schema.name().to_string(),
                    field: field.clone(),
                });
            }

            clauses.push(match value {
                Bson::Null => Expr::IsNull(field.clone(), true),
                Bson::Array(_) => Expr::field(field.clone(), FieldOp::In, value.clone()),
                Bson::Document(operators) => self.compile_operator_map(field, operators)?,
                scalar => Expr::field(field.clone(), FieldOp::Eq, scalar.clone()),
            });
        }

        Ok(clauses)
    }

    fn compile_operator_map(&self, field: &str, operators: &Document) -> StoreResult<Expr> {
        // Reject the whole map if any key is unrecognized, including an
        // empty map. Unknown keys never degrade to equality.
        for key in operators.keys() {
            if !FILTER_OPERATORS.contains(&key.as_str()) {
                return Err(StoreError::InvalidFilterOperator {
                    field: field.to_string(),
                    operators: FILTER_OPERATORS,
                });
            }
        }

        let mut clauses = Vec::with_capacity(operators.len());

        for operator in FILTER_OPERATORS {
            let Some(operand) = operators.get(operator) else {
                continue;
            };

            clauses.push(self.compile_operator(field, operator, operand)?);
        }

        match clauses.len() {
            0 => Err(StoreError::InvalidFilterOperator {
                field: field.to_string(),
                operators: FILTER_OPERATORS,
            }),
            1 => Ok(clauses.remove(0)),
            _ => Ok(Expr::And(clauses)),
        }
    }

    fn compile_operator(&self, field: &str, operator: &str, operand: &Bson) -> StoreResult<Expr> {
        match operator {
            "not" => match operand {
                Bson::Null => Ok(Expr::IsNull(field.to_string(), false)),
                _ => Err(StoreError::InvalidOperand {
                    field: field.to_string(),
                    operator: "not",
                    reason: "only null is supported",
                }),
            },
            ">=" => Ok(Expr::field(field.to_string(), FieldOp::Gte, operand.clone())),
            "<=" => Ok(Expr::field(field.to_string(), FieldOp::Lte, operand.clone())),
            ">" => Ok(Expr::field(field.to_string(), FieldOp::Gt, operand.clone())),
            "<" => Ok(Expr::field(field.to_string(), FieldOp::Lt, operand.clone())),
            "between" => match operand {
                Bson::Array(bounds) if bounds.len() == 2 => Ok(Expr::And(vec![
                    Expr::field(field.to_string(), FieldOp::Gte, bounds[0].clone()),
                    Expr::field(field.to_string(), FieldOp::Lte, bounds[1].clone()),
                ])),
                _ => Err(StoreError::InvalidOperand {
                    field: field.to_string(),
                    operator: "between",
                    reason: "expects a [low, high] pair",
                }),
            },
            "not_in" => match operand {
                Bson::Array(_) => Ok(Expr::field(
                    field.to_string(),
                    FieldOp::NotIn,
                    operand.clone(),
                )),
                _ => Err(StoreError::InvalidOperand {
                    field: field.to_string(),
                    operator: "not_in",
                    reason: "expects a list of values",
                }),
            },
            "like" => match operand {
                Bson::String(_) => Ok(Expr::field(
                    field.to_string(),
                    FieldOp::Like,
                    operand.clone(),
                )),
                _ => Err(StoreError::InvalidOperand {
                    field: field.to_string(),
                    operator: "like",
                    reason: "expects a string pattern",
                }),
            },
            "ilike" => match operand {
                Bson::String(_) => Ok(Expr::field(
                    field.to_string(),
                    FieldOp::ILike,
                    operand.clone(),
                )),
                _ => Err(StoreError::InvalidOperand {
                    field: field.to_string(),
                    operator: "ilike",
                    reason: "expects a string pattern",
                }),
            },
            _ => unreachable!("operator keys are validated before dispatch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn schema() -> TableSchema {
        TableSchema::new("users")
            .field("name")
            .field("email")
            .field("age")
            .field("status")
            .field("department")
    }

    fn compile_one(filters: Document) -> StoreResult<Expr> {
        let schema = schema();
        let mut clauses = FilterCompiler::new(&schema).compile(&filters)?;
        assert_eq!(clauses.len(), 1);
        Ok(clauses.remove(0))
    }

    #[test]
    fn scalar_compiles_to_equality() {
        let clause = compile_one(doc! { "status": "active" }).unwrap();
        assert_eq!(
            clause,
            Expr::field("status".into(), FieldOp::Eq, Bson::String("active".into()))
        );
    }

    #[test]
    fn list_compiles_to_membership() {
        let clause = compile_one(doc! { "status": ["a", "b"] }).unwrap();
        assert_eq!(
            clause,
            Expr::field(
                "status".into(),
                FieldOp::In,
                Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())]),
            )
        );
    }

    #[test]
    fn null_compiles_to_is_null() {
        let clause = compile_one(doc! { "status": null }).unwrap();
        assert_eq!(clause, Expr::IsNull("status".into(), true));
    }

    #[test]
    fn not_null_compiles_to_is_not_null() {
        let clause = compile_one(doc! { "status": { "not": null } }).unwrap();
        assert_eq!(clause, Expr::IsNull("status".into(), false));
    }

    #[test]
    fn unrecognized_operator_fails_loudly() {
        let err = compile_one(doc! { "status": { "frobnicate": 1 } }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilterOperator { ref field, .. } if field == "status"));
    }

    #[test]
    fn empty_operator_map_is_rejected() {
        let err = compile_one(doc! { "status": {} }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilterOperator { .. }));
    }

    #[test]
    fn unrecognized_key_rejects_the_whole_map() {
        let err = compile_one(doc! { "age": { ">=": 18, "frobnicate": 1 } }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFilterOperator { .. }));
    }

    #[test]
    fn range_operators_apply_conjunctively() {
        let clause = compile_one(doc! { "age": { ">=": 20, "<=": 1000 } }).unwrap();
        assert_eq!(
            clause,
            Expr::And(vec![
                Expr::field("age".into(), FieldOp::Gte, Bson::Int32(20)),
                Expr::field("age".into(), FieldOp::Lte, Bson::Int32(1000)),
            ])
        );
    }

    #[test]
    fn between_compiles_to_inclusive_range() {
        let clause = compile_one(doc! { "age": { "between": [25, 30] } }).unwrap();
        assert_eq!(
            clause,
            Expr::And(vec![
                Expr::field("age".into(), FieldOp::Gte, Bson::Int32(25)),
                Expr::field("age".into(), FieldOp::Lte, Bson::Int32(30)),
            ])
        );
    }

    #[test]
    fn between_requires_a_pair() {
        let err = compile_one(doc! { "age": { "between": [25] } }).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidOperand { operator: "between", .. }
        ));

        let err = compile_one(doc! { "age": { "between": [1, 2, 3] } }).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidOperand { operator: "between", .. }
        ));
    }

    #[test]
    fn not_with_value_is_rejected() {
        let err = compile_one(doc! { "status": { "not": "active" } }).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperand { operator: "not", .. }));
    }

    #[test]
    fn not_in_requires_a_list() {
        let err = compile_one(doc! { "status": { "not_in": "active" } }).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidOperand { operator: "not_in", .. }
        ));
    }

    #[test]
    fn unknown_field_is_a_checked_error() {
        let schema = schema();
        let err = FilterCompiler::new(&schema)
            .compile(&doc! { "nmae": "typo" })
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { ref field, .. } if field == "nmae"));
    }

    #[test]
    fn one_clause_per_field() {
        let schema = schema();
        let clauses = FilterCompiler::new(&schema)
            .compile(&doc! {
                "age": { ">=": 18 },
                "department": ["Engineering", "Product"],
                "email": { "not": null },
            })
            .unwrap();
        assert_eq!(clauses.len(), 3);
    }
}
