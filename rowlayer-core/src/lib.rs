//! A thin typed data-access convenience layer over a relational store.
//!
//! This crate is the core of the rowlayer project and provides:
//!
//! - **Entity traits** ([`entity`]) - Core traits for defining and serializing entities
//! - **Schema registry** ([`schema`]) - Static per-table field and relationship metadata
//! - **Query and predicate API** ([`query`]) - Type-safe query construction
//! - **Filter compilation** ([`filter`]) - Dynamic filter maps to predicate clauses
//! - **Storage engine abstraction** ([`engine`]) - Trait for implementing storage engines
//! - **Repositories** ([`repo`]) - Generic CRUD, search, soft delete, bulk statements
//! - **Association inspection** ([`association`]) - Junction resolution and strategy choice
//! - **Relationship management** ([`m2m`]) - Many-to-many links behind two strategies
//! - **Client** ([`client`]) - Main interface owning an engine and the registry
//! - **Pagination** ([`page`]) - Windowed reads with totals
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use rowlayer_core::{entity::Entity, schema::TableSchema};
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub name: String,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn table() -> &'static str {
//!         "users"
//!     }
//!
//!     fn schema() -> TableSchema {
//!         TableSchema::new("users").field("name")
//!     }
//! }
//! ```

pub mod association;
pub mod client;
pub mod engine;
pub mod entity;
pub mod error;
pub mod filter;
pub mod m2m;
pub mod page;
pub mod query;
pub mod repo;
pub mod schema;
