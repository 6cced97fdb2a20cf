//! Error types and result types for store operations.
//!
//! This module provides error handling for every layer of the store.
//! Use [`StoreResult<T>`] as the return type for fallible operations.

use bson::{Uuid, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with the store.
///
/// This enum covers serialization errors, filter compilation errors, schema
/// validation, relationship management, and engine-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when converting between rows and entities.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A filter, sort, or change set referenced a field the table does not declare.
    #[error("Unknown field {field} on table {table}")]
    UnknownField {
        /// The table whose registry was consulted.
        table: String,
        /// The offending field name.
        field: String,
    },
    /// A prefetch hint or relationship lookup referenced an undeclared relationship.
    #[error("Unknown relationship {relationship} on table {table}")]
    UnknownRelationship {
        /// The table whose registry was consulted.
        table: String,
        /// The offending relationship name.
        relationship: String,
    },
    /// A filter operator map contained a key outside the supported operator set.
    ///
    /// Unrecognized operator keys are never reinterpreted as equality.
    #[error("Unrecognized filter operator for field {field}; supported operators: {}", .operators.join(", "))]
    InvalidFilterOperator {
        /// The field whose operator map was rejected.
        field: String,
        /// The full set of supported operator keys.
        operators: &'static [&'static str],
    },
    /// A recognized filter operator was given an operand it cannot accept.
    #[error("Invalid operand for operator {operator} on field {field}: {reason}")]
    InvalidOperand {
        /// The field whose constraint was rejected.
        field: String,
        /// The operator key.
        operator: &'static str,
        /// Why the operand was rejected.
        reason: &'static str,
    },
    /// A soft-delete operation was invoked on a table without a deletion marker.
    #[error("Table {0} does not declare a soft-delete marker")]
    UnsupportedSoftDelete(String),
    /// A relationship operation referenced an endpoint row that does not exist.
    #[error("No {table} row with id {id}")]
    EndpointNotFound {
        /// The endpoint's table.
        table: String,
        /// The missing identity.
        id: Uuid,
    },
    /// An insert violated a unique key (for junction tables, the composite
    /// key over the two foreign-key columns).
    #[error("Duplicate key in table {0}")]
    DuplicateKey(String),
    /// The requested table is not known to the engine.
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// An error occurred in the underlying storage engine.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
