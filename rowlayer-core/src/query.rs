//! Query construction and predicate API for relational storage engines.
//!
//! This module provides type-safe query construction with predicate clauses, sorting,
//! pagination windows, junction joins, and a visitor pattern for query execution
//! across different engines.
//!
//! # Query Building
//!
//! Queries can be constructed using the fluent builder API:
//!
//! ```ignore
//! use rowlayer_core::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("name", "Alice"))
//!     .limit(10)
//!     .offset(0)
//!     .sort("created_at", SortDirection::Desc)
//!     .build();
//! ```
//!
//! # Predicate API
//!
//! The [`Filter`] struct provides a collection of static methods for building
//! predicate clauses:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`, `is_not_in`
//! - Null checks: `is_null`, `is_not_null`
//! - Patterns: `like`, `ilike`
//! - Logical: `and`, `or`
//!
//! Clauses can be combined using the chainable `and`/`or`/`not` methods.

use bson::{Bson, Uuid};

use crate::error::StoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, PartialEq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
///
/// Specifies which field to sort by and in which direction. The engine must
/// apply the sort before computing any pagination window; a window over an
/// unsorted result set is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for predicate clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// Value is a member of the operand list (SQL `IN`).
    In,
    /// Value is not a member of the operand list (SQL `NOT IN`).
    NotIn,
    /// Case-sensitive SQL `LIKE` pattern match (`%` and `_` wildcards).
    Like,
    /// Case-insensitive `LIKE` pattern match.
    ILike,
}

/// A predicate clause over the fields of one table.
///
/// Clauses can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex predicates.
///
/// # Example
///
/// ```ignore
/// use rowlayer_core::query::Filter;
///
/// // Simple equality check
/// let expr1 = Filter::eq("status", "active");
///
/// // Complex nested expression
/// let expr2 = Filter::and(vec![
///     Filter::eq("status", "active"),
///     Filter::gt("age", 18),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple clauses (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple clauses (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of a clause (inverts the result).
    Not(Box<Expr>),
    /// Checks whether a field is null (`true`) or non-null (`false`).
    IsNull(String, bool),
    /// Field comparison clause.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison clause.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this clause with another using logical AND.
    ///
    /// If this clause is already an AND, the other clause is appended
    /// to the list. Otherwise, a new AND clause is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this clause with another using logical OR.
    ///
    /// If this clause is already an OR, the other clause is appended
    /// to the list. Otherwise, a new OR clause is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this clause (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// A join through a many-to-many junction table.
///
/// Selects rows of the queried table whose identity appears in `join_column`
/// of junction rows where `match_column` equals `match_id`. Engines evaluate
/// the join server-side, before sorting and windowing, so a page of related
/// rows never materializes the full related set.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionJoin {
    /// The junction table name.
    pub junction_table: String,
    /// The junction column constrained to `match_id`.
    pub match_column: String,
    /// The identity to match on `match_column`.
    pub match_id: Uuid,
    /// The junction column joined against the queried table's identity.
    pub join_column: String,
}

/// A structured query for retrieving and filtering rows.
///
/// This struct encapsulates the predicate, junction join, sort, pagination
/// window, and prefetch hints for one select. Use [`QueryBuilder`] for
/// ergonomic construction.
///
/// # Example
///
/// ```ignore
/// use rowlayer_core::query::{Query, Filter, SortDirection};
///
/// let query = Query::builder()
///     .filter(Filter::eq("status", "active"))
///     .limit(10)
///     .offset(0)
///     .sort("created_at", SortDirection::Desc)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional predicate rows must match.
    pub filter: Option<Expr>,
    /// Optional junction join restricting rows to one side of a relationship.
    pub join: Option<JunctionJoin>,
    /// Sort specification for results, applied before the window.
    pub sort: Option<Sort>,
    /// Number of rows to skip (for pagination).
    pub offset: Option<usize>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Relationships to prefetch in the same round trip. Engines without
    /// lazy loading may ignore these hints.
    pub prefetch: Vec<String>,
}

impl Query {
    /// Creates a new empty query with no predicate or window.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Helper struct for constructing predicate clauses.
///
/// Provides static methods to construct common clauses in a type-safe manner.
/// All methods accept field names and values as `Into<String>` and `Into<Bson>`
/// for ergonomics.
///
/// # Example
///
/// ```ignore
/// use rowlayer_core::query::Filter;
///
/// let expr = Filter::eq("name", "Alice")
///     .and(Filter::gt("age", 18));
/// ```
pub struct Filter;

impl Filter {
    /// Creates an equality clause.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Creates a not-equal clause.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    /// Creates a greater-than clause.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    /// Creates a greater-than-or-equal clause.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    /// Creates a less-than clause.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    /// Creates a less-than-or-equal clause.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Creates a membership clause (SQL `IN`).
    pub fn is_in(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::In, values.into())
    }

    /// Creates an exclusion clause (SQL `NOT IN`).
    pub fn is_not_in(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotIn, values.into())
    }

    /// Creates an `IS NULL` clause.
    pub fn is_null(field: impl Into<String>) -> Expr {
        Expr::IsNull(field.into(), true)
    }

    /// Creates an `IS NOT NULL` clause.
    pub fn is_not_null(field: impl Into<String>) -> Expr {
        Expr::IsNull(field.into(), false)
    }

    /// Creates a case-sensitive pattern clause (SQL `LIKE`).
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Like, Bson::String(pattern.into()))
    }

    /// Creates a case-insensitive pattern clause.
    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::ILike, Bson::String(pattern.into()))
    }

    /// Creates a logical AND over multiple clauses.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Creates a logical OR over multiple clauses.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the predicate for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the junction join for this query.
    pub fn join(mut self, join: JunctionJoin) -> Self {
        self.query.join = Some(join);
        self
    }

    /// Sets the maximum number of rows to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip (for pagination).
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sets the sort specification for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Adds a relationship prefetch hint.
    pub fn prefetch(mut self, relationship: impl Into<String>) -> Self {
        self.query.prefetch.push(relationship.into());
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<StoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_is_null(
        &mut self,
        field: &str,
        expect_null: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::IsNull(field, expect_null) => self.visit_is_null(field, *expect_null),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}
