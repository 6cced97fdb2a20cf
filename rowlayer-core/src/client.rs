//! Main client interface for working with a storage engine.
//!
//! A [`StoreClient`] owns one engine and the schema registry assembled at
//! startup, and hands out typed repositories and relationship managers that
//! borrow the engine.
//!
//! # Example
//!
//! ```ignore
//! use rowlayer_core::{client::StoreClient, schema::SchemaRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(SchemaRegistry::builder().register::<User>().register::<Role>().build());
//! let client = StoreClient::new(engine, registry);
//!
//! let users = client.repo::<User>();
//! let roles = client.relationship::<User, Role>("roles", "users");
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::{
    engine::StorageEngine,
    entity::Entity,
    error::StoreResult,
    m2m::RelationshipManager,
    repo::Repository,
    schema::SchemaRegistry,
};

/// A client bound to one storage engine.
#[derive(Debug)]
pub struct StoreClient<E: StorageEngine> {
    engine: E,
    registry: Arc<SchemaRegistry>,
}

impl<E: StorageEngine> StoreClient<E> {
    /// Creates a client over an engine and the startup-built registry.
    pub fn new(engine: E, registry: Arc<SchemaRegistry>) -> Self {
        debug!("store client initialized");

        Self { engine, registry }
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Creates a typed repository for an entity type.
    pub fn repo<T: Entity>(&self) -> Repository<'_, E, T> {
        let schema = self
            .registry
            .table(T::table())
            .cloned()
            .unwrap_or_else(T::schema);

        Repository::new(&self.engine, schema)
    }

    /// Creates a relationship manager for the many-to-many relationship named
    /// `source_attr` on the owning side and `target_attr` on the related side.
    ///
    /// The backing strategy is selected here, once, from the junction shape.
    pub fn relationship<S: Entity, T: Entity>(
        &self,
        source_attr: &'static str,
        target_attr: &'static str,
    ) -> RelationshipManager<'_, E, S, T> {
        RelationshipManager::new(&self.engine, &self.registry, source_attr, target_attr)
    }

    /// Shuts down the client, releasing engine resources.
    pub async fn shutdown(self) -> StoreResult<()> {
        self.engine.shutdown().await?;

        Ok(())
    }
}
