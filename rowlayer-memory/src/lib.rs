//! In-memory storage engine for rowlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StorageEngine` trait. It uses async-aware read-write locks for concurrent
//! access and is ideal for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Predicates, junction joins, sorting, and windows
//! - **Junction uniqueness** - Composite-key enforcement over foreign-key pairs
//! - **Collection path** - Relationship collections resolved from the schema registry
//!
//! # Quick Start
//!
//! ```ignore
//! use rowlayer_core::{client::StoreClient, schema::SchemaRegistry};
//! use rowlayer_memory::InMemoryEngine;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(SchemaRegistry::builder().register::<User>().build());
//!     let engine = InMemoryEngine::new(registry.clone());
//!     let client = StoreClient::new(engine, registry);
//!
//!     let users = client.repo::<User>();
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryEngine, InMemoryEngineBuilder};
