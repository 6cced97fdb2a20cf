//! Predicate evaluation for in-memory row filtering.
//!
//! This module provides the evaluation engine for predicate clauses,
//! enabling filtering, comparison, membership, and LIKE-pattern operations
//! on BSON row documents.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use rowlayer_core::{
    error::{StoreError, StoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// This enum wraps BSON values and provides comparison operations for
/// predicate evaluation. It normalizes numeric types to f64 and exposes
/// binary values (entity identities) by byte order, so sorting by `id` is
/// stable and deterministic.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Binary value, compared by byte order
    Bytes(&'a [u8]),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Bytes(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Bytes(a), Comparable::Bytes(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Bytes(a), Comparable::Bytes(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Matches a SQL LIKE pattern (`%` matches any sequence, `_` any single
/// character) against a string, with backtracking on `%`.
pub(crate) fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '_' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(star_at) = star {
            pi = star_at + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '%' {
        pi += 1;
    }

    pi == pattern.len()
}

/// Case-insensitive LIKE match.
pub(crate) fn ilike_match(pattern: &str, text: &str) -> bool {
    like_match(&pattern.to_lowercase(), &text.to_lowercase())
}

pub(crate) struct RowEvaluator<'a> {
    row: &'a Document,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(row: &'a Document) -> Self {
        Self { row }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> StoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_rows(
        rows: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> Vec<Document> {
        rows
            .into_iter()
            .filter(|row| {
                RowEvaluator::new(row)
                    .evaluate(expr)
                    .unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<_>>()
    }

    fn membership(row_value: &Bson, operand: &Bson) -> bool {
        match operand {
            Bson::Array(values) => {
                let left = Comparable::from(row_value);

                values
                    .iter()
                    .any(|value| left == Comparable::from(value))
            }
            _ => false,
        }
    }
}

impl<'a> QueryVisitor for RowEvaluator<'a> {
    type Output = bool;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_is_null(&mut self, field: &str, expect_null: bool) -> Result<Self::Output, Self::Error> {
        let is_null = matches!(self.row.get(field), None | Some(Bson::Null));

        Ok(is_null == expect_null)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        // Comparisons against a missing or null column follow SQL
        // three-valued logic: nothing matches, not even Ne or NotIn.
        let row_value = match self.row.get(field) {
            None | Some(Bson::Null) => return Ok(false),
            Some(row_value) => row_value,
        };

        match op {
            FieldOp::Eq => Ok(Comparable::from(row_value) == Comparable::from(value)),
            FieldOp::Ne => Ok(Comparable::from(row_value) != Comparable::from(value)),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match Comparable::from(row_value).partial_cmp(&Comparable::from(value)) {
                    Some(ordering) => Ok(match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering == Ordering::Greater || ordering == Ordering::Equal,
                        FieldOp::Lt => ordering == Ordering::Less,
                        FieldOp::Lte => ordering == Ordering::Less || ordering == Ordering::Equal,
                        _ => unreachable!(),
                    }),
                    None => Ok(false),
                }
            }
            FieldOp::In => Ok(Self::membership(row_value, value)),
            FieldOp::NotIn => Ok(!Self::membership(row_value, value)),
            FieldOp::Like => match (row_value, value) {
                (Bson::String(text), Bson::String(pattern)) => Ok(like_match(pattern, text)),
                _ => Ok(false),
            },
            FieldOp::ILike => match (row_value, value) {
                (Bson::String(text), Bson::String(pattern)) => Ok(ilike_match(pattern, text)),
                _ => Ok(false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use rowlayer_core::query::Filter;

    fn matches(row: &Document, expr: &Expr) -> bool {
        RowEvaluator::new(row).evaluate(expr).unwrap()
    }

    #[test]
    fn like_patterns() {
        assert!(like_match("%oo%", "foobar"));
        assert!(like_match("foo%", "foobar"));
        assert!(like_match("%bar", "foobar"));
        assert!(like_match("f__bar", "foobar"));
        assert!(like_match("%", ""));
        assert!(like_match("%b%r%", "foobar"));
        assert!(!like_match("foo", "foobar"));
        assert!(!like_match("%baz%", "foobar"));
        assert!(!like_match("f_bar", "foobar"));
    }

    #[test]
    fn ilike_folds_case() {
        assert!(ilike_match("%OO%", "Foobar"));
        assert!(!like_match("%OO%", "Foobar"));
    }

    #[test]
    fn comparisons_against_null_never_match() {
        let row = doc! { "name": "Alice", "department": null };

        assert!(!matches(&row, &Filter::eq("department", "Engineering")));
        assert!(!matches(&row, &Filter::ne("department", "Engineering")));
        assert!(!matches(&row, &Filter::is_not_in("department", vec!["Engineering"])));
        assert!(!matches(&row, &Filter::eq("missing", 1)));
    }

    #[test]
    fn null_checks() {
        let row = doc! { "name": "Alice", "department": null };

        assert!(matches(&row, &Filter::is_null("department")));
        assert!(matches(&row, &Filter::is_null("missing")));
        assert!(matches(&row, &Filter::is_not_null("name")));
        assert!(!matches(&row, &Filter::is_not_null("department")));
    }

    #[test]
    fn membership_and_exclusion() {
        let row = doc! { "department": "Engineering" };

        assert!(matches(&row, &Filter::is_in("department", vec!["Engineering", "Product"])));
        assert!(!matches(&row, &Filter::is_in("department", vec!["Sales"])));
        assert!(matches(&row, &Filter::is_not_in("department", vec!["Sales"])));
        assert!(!matches(&row, &Filter::is_not_in("department", vec!["Engineering"])));
    }

    #[test]
    fn numeric_widths_compare_equal() {
        let row = doc! { "age": 30_i64 };

        assert!(matches(&row, &Filter::eq("age", 30_i32)));
        assert!(matches(&row, &Filter::gte("age", 30.0)));
        assert!(matches(&row, &Filter::lt("age", 31_i32)));
    }

    #[test]
    fn binary_identities_are_ordered() {
        let a = Comparable::Bytes(&[0, 1, 2]);
        let b = Comparable::Bytes(&[0, 1, 3]);

        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
        assert!(a == Comparable::Bytes(&[0, 1, 2]));
    }
}
