//! Storage engine abstraction for the store.
//!
//! This module defines the core trait that abstracts over relational storage
//! implementations, allowing the repositories and relationship managers to work
//! against any engine (in-memory, SQL-backed, remote, etc.).
//!
//! # Overview
//!
//! The [`StorageEngine`] trait provides a unified async interface for row
//! operations (insert, point fetch, predicated select/count/exists, bulk
//! update/delete), the transactional scope protocol, and the collection
//! persistence path used by the collection-based relationship strategy.
//! Implementations are required to be thread-safe (`Send + Sync`) and support
//! concurrent access.
//!
//! # Transactional scopes
//!
//! Every public store operation runs inside exactly one transactional scope:
//! [`begin`](StorageEngine::begin) is called before the engine round trips,
//! [`commit`](StorageEngine::commit) on success, and
//! [`rollback`](StorageEngine::rollback) on any error path. The [`with_scope`]
//! helper implements this protocol; higher layers never call the scope methods
//! directly.
//!
//! # Error Handling
//!
//! Operations return [`StoreResult<T>`](crate::error::StoreResult). Engines
//! must report a unique-key violation from [`insert_rows`](StorageEngine::insert_rows)
//! as [`StoreError::DuplicateKey`](crate::error::StoreError::DuplicateKey) so
//! that callers can distinguish benign conflicts from genuine failures.

use async_trait::async_trait;
use bson::{Bson, Document, Uuid};
use std::{fmt::Debug, future::Future};

use crate::{
    error::StoreResult,
    query::{Expr, Query},
};

/// Abstract interface for relational storage engines.
///
/// Implementers of this trait provide concrete storage for entity rows and
/// junction rows, predicate evaluation, and the transactional scope protocol.
/// Rows are BSON documents keyed by a binary `id` field holding a UUID;
/// junction rows carry the foreign-key columns declared in the schema registry.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks. The exact concurrency model is implementation-specific
/// but should be documented by the implementer.
#[async_trait]
pub trait StorageEngine: Send + Sync + Debug {
    /// Opens a transactional scope.
    async fn begin(&self) -> StoreResult<()>;

    /// Commits the innermost open scope.
    async fn commit(&self) -> StoreResult<()>;

    /// Rolls back the innermost open scope.
    async fn rollback(&self) -> StoreResult<()>;

    /// Inserts new rows into a table.
    ///
    /// Engines must reject an insert that violates a unique key with
    /// [`StoreError::DuplicateKey`](crate::error::StoreError::DuplicateKey);
    /// for junction tables the unique key is the composite over the two
    /// foreign-key columns. Columns omitted from a row take their declared
    /// storage-side defaults.
    async fn insert_rows(&self, table: &str, rows: Vec<Document>) -> StoreResult<()>;

    /// Retrieves rows from a table by their identities.
    ///
    /// Missing identities are omitted from the result.
    async fn fetch_rows(&self, table: &str, ids: Vec<Uuid>) -> StoreResult<Vec<Document>>;

    /// Executes a structured query against a table.
    ///
    /// The engine applies the junction join and predicate first, then the
    /// sort, then the pagination window. The window must never be computed
    /// over an unsorted result when a sort is present.
    async fn select(&self, query: Query, table: &str) -> StoreResult<Vec<Document>>;

    /// Counts rows matching a predicate with a single statement.
    async fn count(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64>;

    /// Checks whether any row matches a predicate, without materializing rows.
    async fn exists(&self, table: &str, predicate: Expr) -> StoreResult<bool>;

    /// Updates all rows matching a predicate as a single statement, applying
    /// the given field changes. Returns the number of rows updated. Matched
    /// rows are never loaded into process memory.
    async fn update_where(
        &self,
        table: &str,
        predicate: Option<Expr>,
        changes: Document,
    ) -> StoreResult<u64>;

    /// Deletes all rows matching a predicate as a single statement. Returns
    /// the number of rows deleted.
    async fn delete_where(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64>;

    /// Returns the distinct values of a field across rows matching a predicate.
    async fn distinct(
        &self,
        table: &str,
        field: &str,
        predicate: Option<Expr>,
    ) -> StoreResult<Vec<Bson>>;

    /// Loads the identities in an entity's live relationship collection.
    ///
    /// This is the collection persistence path: the engine resolves the named
    /// relationship from its schema knowledge and returns the complete set of
    /// related identities for the owning row, or `None` when the owning row
    /// does not exist.
    async fn related_ids(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
    ) -> StoreResult<Option<Vec<Uuid>>>;

    /// Appends a target to an entity's relationship collection, persisting
    /// through the owning entity's normal save path. Declared junction column
    /// defaults are populated, and appending an already-linked target is a
    /// no-op.
    async fn link(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
        target: Uuid,
    ) -> StoreResult<()>;

    /// Removes a target from an entity's relationship collection through the
    /// same save path as [`link`](StorageEngine::link). Removing an unlinked
    /// target is a no-op.
    async fn unlink(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
        target: Uuid,
    ) -> StoreResult<()>;

    /// Cleanly shuts down the engine, releasing all resources.
    ///
    /// The default implementation is a no-op, but engines with connections or
    /// persistent state should override this.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Runs one unit of work inside a transactional scope.
///
/// Opens a scope, awaits the work, commits on success, and rolls back on any
/// error before propagating it. A rollback failure after a failed operation is
/// logged and swallowed; the original error wins.
pub async fn with_scope<E, T, F>(engine: &E, work: F) -> StoreResult<T>
where
    E: StorageEngine + ?Sized,
    F: Future<Output = StoreResult<T>>,
{
    engine.begin().await?;

    match work.await {
        Ok(value) => {
            engine.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = engine.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed after operation error");
            }

            Err(err)
        }
    }
}

/// Factory trait for creating engine instances.
#[async_trait]
pub trait EngineBuilder {
    type Engine: StorageEngine;

    async fn build(self) -> StoreResult<Self::Engine>;
}
