//! Main rowlayer crate providing a unified interface for typed data access.
//!
//! This crate is the primary entry point for users of the rowlayer project.
//! It re-exports the core types and functionality from various sub-crates and
//! provides convenient access to the in-memory engine.
//!
//! # Features
//!
//! - **Typed repositories** - Define your entities with Serde and get generic
//!   CRUD, search, soft delete, and bulk statements
//! - **Dynamic filters** - A filter DSL over plain BSON documents with a
//!   checked operator grammar
//! - **Relationship management** - Many-to-many links behind a strategy
//!   selected from the junction shape
//! - **Pluggable engines** - Any `StorageEngine` implementation; an in-memory
//!   engine ships for development and testing
//!
//! # Quick Start
//!
//! ```ignore
//! use rowlayer::{memory::InMemoryEngine, prelude::*};
//! use bson::{doc, Uuid};
//! use serde::{Serialize, Deserialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub id: Uuid,
//!     pub name: String,
//!     pub age: i64,
//! }
//!
//! impl Entity for User {
//!     fn id(&self) -> &Uuid { &self.id }
//!     fn table() -> &'static str { "users" }
//!     fn schema() -> TableSchema {
//!         TableSchema::new("users").field("name").field("age")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(SchemaRegistry::builder().register::<User>().build());
//!     let client = StoreClient::new(InMemoryEngine::new(registry.clone()), registry);
//!
//!     let users = client.repo::<User>();
//!     users
//!         .insert(User { id: Uuid::new(), name: "Alice".to_string(), age: 34 })
//!         .await
//!         .unwrap();
//!
//!     let adults = users
//!         .list(&ListParams {
//!             filters: doc! { "age": { ">=": 18 } },
//!             ..ListParams::default()
//!         })
//!         .await
//!         .unwrap();
//!
//!     println!("Queried users: {adults:?}");
//!
//!     client.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Relationship management
//!
//! A [`RelationshipManager`](m2m::RelationshipManager) exposes the same
//! seven-operation contract regardless of the backing strategy; which strategy
//! was selected is observable for diagnostics:
//!
//! ```ignore
//! let roles = client.relationship::<User, Role>("roles", "users");
//!
//! roles.add_relationship(user_id, role_id).await?;
//! assert!(roles.relationship_exists(user_id, role_id).await?);
//! println!("backed by {}", roles.strategy_kind().as_str());
//! ```
//!
//! # Engines
//!
//! - [`memory`] - Fast in-memory engine for development and testing

pub mod prelude;

pub use rowlayer_core::{
    association, client, engine, entity, error, filter, m2m, page, query, repo, schema,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage engine implementations.
pub mod memory {
    pub use rowlayer_memory::{InMemoryEngine, InMemoryEngineBuilder};
}
