//! Core traits and types for entity representation and serialization.
//!
//! This module provides the fundamental traits that all stored entities must implement,
//! as well as utilities for converting entities between row (BSON) and JSON formats.

use bson::{Bson, Document, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::{
    error::{StoreError, StoreResult},
    schema::TableSchema,
};

/// Core trait that all entities stored in a table must implement.
///
/// This trait defines the minimal interface required for a type to be used as an
/// entity. Every entity must have a unique identifier, name the table it lives in,
/// and describe that table's shape (fields, soft-delete marker, relationships).
///
/// The schema returned by [`Entity::schema`] is assembled into a
/// [`SchemaRegistry`](crate::schema::SchemaRegistry) once at startup; field and
/// relationship names in filters, sorts, and prefetch hints are validated against it.
///
/// # Example
///
/// ```ignore
/// use rowlayer_core::{entity::Entity, schema::{JunctionSchema, TableSchema}};
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     pub id: Uuid,
///     pub name: String,
///     pub email: String,
/// }
///
/// impl Entity for User {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn table() -> &'static str {
///         "users"
///     }
///
///     fn schema() -> TableSchema {
///         TableSchema::new("users")
///             .field("name")
///             .field("email")
///             .many_to_many(
///                 "roles",
///                 "roles",
///                 JunctionSchema::new("user_roles")
///                     .foreign_key("user_id", "users")
///                     .foreign_key("role_id", "roles"),
///             )
///     }
/// }
/// ```
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this entity's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the table this entity belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "users", "products").
    fn table() -> &'static str;

    /// Returns the declared shape of this entity's table.
    fn schema() -> TableSchema;
}

/// Extension trait providing serialization/deserialization utilities for entities.
///
/// This trait is automatically implemented for all types that implement [`Entity`].
/// It provides convenient methods to convert entities to and from row and JSON formats.
pub trait EntityExt: Entity {
    /// Converts this entity to a row document for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the entity does not
    /// serialize to a document.
    fn to_row(&self) -> StoreResult<Document>;

    /// Creates an entity from a row document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_row(row: Document) -> StoreResult<Self>;

    /// Converts this entity to a JSON value for serialization.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> StoreResult<Value>;

    /// Creates an entity from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> StoreResult<Self>;
}

impl<T: Entity> EntityExt for T {
    fn to_row(&self) -> StoreResult<Document> {
        match serialize_to_bson(self)? {
            Bson::Document(row) => Ok(row),
            other => Err(StoreError::Serialization(format!(
                "expected a document row, got {other:?}"
            ))),
        }
    }

    fn from_row(row: Document) -> StoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(row))?)
    }

    fn to_json(&self) -> StoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> StoreResult<Self> {
        Ok(from_value(value)?)
    }
}
