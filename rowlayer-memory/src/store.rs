//! In-memory storage engine implementation.
//!
//! This module provides a simple but complete engine that stores entity rows
//! and junction rows as BSON documents in HashMaps with async-safe
//! read-write locks.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, Uuid, de::deserialize_from_bson};

use rowlayer_core::{
    engine::{EngineBuilder, StorageEngine},
    error::{StoreError, StoreResult},
    query::{Expr, Query, SortDirection},
    schema::{JunctionSchema, RelationKind, SchemaRegistry},
};

use crate::evaluator::{Comparable, RowEvaluator};

type RowMap = HashMap<String, Document>;
type TableMap = HashMap<String, RowMap>;
type JunctionMap = HashMap<String, Vec<Document>>;

fn bson_to_uuid(value: &Bson) -> Option<Uuid> {
    deserialize_from_bson::<Uuid>(value.clone()).ok()
}

fn row_id(table: &str, row: &Document) -> StoreResult<Uuid> {
    row.get("id")
        .and_then(bson_to_uuid)
        .ok_or_else(|| StoreError::Backend(format!("row in table {table} lacks a uuid id")))
}

/// Populates declared column defaults on a row that omits them.
fn apply_defaults(junction: &JunctionSchema, row: &mut Document) {
    for column in &junction.columns {
        if let Some(default) = &column.default {
            if !row.contains_key(column.name) {
                row.insert(column.name, default.clone());
            }
        }
    }
}

/// The two foreign-key columns enforcing a junction's composite key, in
/// declaration order.
fn junction_keys(junction: &JunctionSchema) -> StoreResult<(&'static str, &'static str)> {
    let mut keys = junction.foreign_keys();

    match (keys.next(), keys.next()) {
        (Some(first), Some(second)) => Ok((first.name, second.name)),
        _ => Err(StoreError::Backend(format!(
            "junction {} does not declare two foreign keys",
            junction.table
        ))),
    }
}

/// Matches a junction's foreign keys to the owning and related tables. For a
/// self-referential junction the first column in declaration order is the
/// owning side.
fn junction_sides(
    owner_table: &str,
    target_table: &str,
    junction: &JunctionSchema,
) -> StoreResult<(&'static str, &'static str)> {
    let mut owner_fk = None;
    let mut target_fk = None;

    for column in junction.foreign_keys() {
        let Some(references) = column.references else {
            continue;
        };

        if references == owner_table && owner_fk.is_none() {
            owner_fk = Some(column.name);
        } else if references == target_table && target_fk.is_none() {
            target_fk = Some(column.name);
        }
    }

    match (owner_fk, target_fk) {
        (Some(owner_fk), Some(target_fk)) => Ok((owner_fk, target_fk)),
        _ => Err(StoreError::Backend(format!(
            "junction {} cannot be matched to {owner_table} and {target_table}",
            junction.table
        ))),
    }
}

/// Thread-safe in-memory storage engine.
///
/// This struct implements the [`StorageEngine`] trait over HashMaps guarded by
/// async-aware read-write locks. Entity rows are indexed by their identity;
/// junction rows are kept per junction table with composite-key uniqueness
/// enforced over the two foreign-key columns.
///
/// The engine is constructed with the startup-built [`SchemaRegistry`], which
/// it consults to route junction tables, resolve relationship collections, and
/// populate declared junction column defaults.
///
/// # Thread Safety
///
/// `InMemoryEngine` is cloneable and uses `Arc`-wrapped internal state,
/// allowing it to be safely shared across async tasks. Multiple clones of the
/// same instance share the same underlying data.
///
/// # Transactional scopes
///
/// Scopes are tracked as a balanced depth counter. The engine does not
/// snapshot state, so a rollback releases the scope without reverting writes;
/// it is a reference implementation, and the scope protocol itself is
/// observable through [`InMemoryEngine::open_scopes`].
///
/// # Performance
///
/// Queries scan all rows of a table (no indexing). For development and test
/// datasets this is acceptable; production workloads belong on a real
/// relational engine.
#[derive(Debug, Clone)]
pub struct InMemoryEngine {
    registry: Arc<SchemaRegistry>,
    tables: Arc<RwLock<TableMap>>,
    junctions: Arc<RwLock<JunctionMap>>,
    scopes: Arc<RwLock<usize>>,
}

impl InMemoryEngine {
    /// Creates a new empty engine over the given registry.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            tables: Arc::new(RwLock::new(TableMap::new())),
            junctions: Arc::new(RwLock::new(JunctionMap::new())),
            scopes: Arc::new(RwLock::new(0)),
        }
    }

    /// Creates a builder for constructing an `InMemoryEngine`.
    pub fn builder(registry: Arc<SchemaRegistry>) -> InMemoryEngineBuilder {
        InMemoryEngineBuilder { registry }
    }

    /// The number of currently open transactional scopes.
    pub async fn open_scopes(&self) -> usize {
        *self.scopes.read().await
    }

    fn known(&self, table: &str) -> StoreResult<()> {
        if self.registry.table(table).is_some() || self.registry.junction(table).is_some() {
            Ok(())
        } else {
            Err(StoreError::TableNotFound(table.to_string()))
        }
    }

    /// All rows of a table, routing junction tables to their own storage.
    async fn all_rows(&self, table: &str) -> StoreResult<Vec<Document>> {
        self.known(table)?;

        if self.registry.junction(table).is_some() {
            Ok(self
                .junctions
                .read()
                .await
                .get(table)
                .cloned()
                .unwrap_or_default())
        } else {
            Ok(self
                .tables
                .read()
                .await
                .get(table)
                .map(|rows| rows.values().cloned().collect())
                .unwrap_or_default())
        }
    }

    async fn entity_exists(&self, table: &str, id: Uuid) -> bool {
        self.tables
            .read()
            .await
            .get(table)
            .is_some_and(|rows| rows.contains_key(&id.to_string()))
    }
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    async fn begin(&self) -> StoreResult<()> {
        *self.scopes.write().await += 1;

        Ok(())
    }

    async fn commit(&self) -> StoreResult<()> {
        let mut scopes = self.scopes.write().await;

        if *scopes == 0 {
            return Err(StoreError::Backend("commit without an open scope".to_string()));
        }

        *scopes -= 1;

        Ok(())
    }

    async fn rollback(&self) -> StoreResult<()> {
        let mut scopes = self.scopes.write().await;

        if *scopes == 0 {
            return Err(StoreError::Backend("rollback without an open scope".to_string()));
        }

        *scopes -= 1;

        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Document>) -> StoreResult<()> {
        self.known(table)?;

        if let Some(junction) = self.registry.junction(table) {
            let (first_fk, second_fk) = junction_keys(junction)?;
            let mut junctions = self.junctions.write().await;
            let existing = junctions.entry(table.to_string()).or_default();

            for mut row in rows {
                let duplicate = existing.iter().any(|current| {
                    current.get(first_fk) == row.get(first_fk)
                        && current.get(second_fk) == row.get(second_fk)
                });

                if duplicate {
                    return Err(StoreError::DuplicateKey(table.to_string()));
                }

                apply_defaults(junction, &mut row);
                existing.push(row);
            }

            return Ok(());
        }

        let mut tables = self.tables.write().await;
        let table_rows = tables.entry(table.to_string()).or_default();

        for row in rows {
            let key = row_id(table, &row)?.to_string();

            if table_rows.contains_key(&key) {
                return Err(StoreError::DuplicateKey(table.to_string()));
            }

            table_rows.insert(key, row);
        }

        Ok(())
    }

    async fn fetch_rows(&self, table: &str, ids: Vec<Uuid>) -> StoreResult<Vec<Document>> {
        self.known(table)?;

        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::with_capacity(ids.len());

        for id in ids {
            if let Some(row) = rows.get(&id.to_string()) {
                found.push(row.clone());
            }
        }

        Ok(found)
    }

    async fn select(&self, query: Query, table: &str) -> StoreResult<Vec<Document>> {
        self.known(table)?;

        // Prefetch hints are no-ops: nothing in this engine loads lazily.
        let candidates = if let Some(join) = &query.join {
            let junction_rows = self
                .junctions
                .read()
                .await
                .get(&join.junction_table)
                .cloned()
                .unwrap_or_default();

            let match_value: Bson = join.match_id.into();
            let related_ids = junction_rows
                .iter()
                .filter(|row| row.get(&join.match_column) == Some(&match_value))
                .filter_map(|row| row.get(&join.join_column))
                .filter_map(bson_to_uuid)
                .collect::<Vec<_>>();

            let tables = self.tables.read().await;
            let rows = tables.get(table);

            related_ids
                .iter()
                .filter_map(|id| rows.and_then(|map| map.get(&id.to_string())).cloned())
                .collect()
        } else {
            self.all_rows(table).await?
        };

        let mut rows = match &query.filter {
            Some(expr) => RowEvaluator::filter_rows(candidates.iter(), expr),
            None => candidates,
        };

        // Sort before the window; a page over an unsorted scan is undefined.
        if let Some(sort) = &query.sort {
            rows.sort_by(|a, b| {
                let left = a
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);
                let right = b
                    .get(&sort.field)
                    .map(Comparable::from)
                    .unwrap_or(Comparable::Null);

                match sort.direction {
                    SortDirection::Asc => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
                    SortDirection::Desc => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
                }
            });
        }

        Ok(rows
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64> {
        let rows = self.all_rows(table).await?;

        Ok(match predicate {
            Some(expr) => RowEvaluator::filter_rows(rows.iter(), &expr).len() as u64,
            None => rows.len() as u64,
        })
    }

    async fn exists(&self, table: &str, predicate: Expr) -> StoreResult<bool> {
        let rows = self.all_rows(table).await?;

        Ok(rows.iter().any(|row| {
            RowEvaluator::new(row)
                .evaluate(&predicate)
                .unwrap_or(false)
        }))
    }

    async fn update_where(
        &self,
        table: &str,
        predicate: Option<Expr>,
        changes: Document,
    ) -> StoreResult<u64> {
        self.known(table)?;

        let matches = |row: &Document| match &predicate {
            Some(expr) => RowEvaluator::new(row).evaluate(expr).unwrap_or(false),
            None => true,
        };

        let mut affected = 0;

        if self.registry.junction(table).is_some() {
            let mut junctions = self.junctions.write().await;

            if let Some(rows) = junctions.get_mut(table) {
                for row in rows.iter_mut().filter(|row| matches(row)) {
                    for (field, value) in &changes {
                        row.insert(field.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
        } else {
            let mut tables = self.tables.write().await;

            if let Some(rows) = tables.get_mut(table) {
                for row in rows.values_mut().filter(|row| matches(row)) {
                    for (field, value) in &changes {
                        row.insert(field.clone(), value.clone());
                    }
                    affected += 1;
                }
            }
        }

        Ok(affected)
    }

    async fn delete_where(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64> {
        self.known(table)?;

        let keep = |row: &Document| match &predicate {
            Some(expr) => !RowEvaluator::new(row).evaluate(expr).unwrap_or(false),
            None => false,
        };

        if self.registry.junction(table).is_some() {
            let mut junctions = self.junctions.write().await;
            let Some(rows) = junctions.get_mut(table) else {
                return Ok(0);
            };

            let before = rows.len();
            rows.retain(|row| keep(row));

            Ok((before - rows.len()) as u64)
        } else {
            let mut tables = self.tables.write().await;
            let Some(rows) = tables.get_mut(table) else {
                return Ok(0);
            };

            let before = rows.len();
            rows.retain(|_, row| keep(row));

            Ok((before - rows.len()) as u64)
        }
    }

    async fn distinct(
        &self,
        table: &str,
        field: &str,
        predicate: Option<Expr>,
    ) -> StoreResult<Vec<Bson>> {
        let rows = self.all_rows(table).await?;
        let rows = match predicate {
            Some(expr) => RowEvaluator::filter_rows(rows.iter(), &expr),
            None => rows,
        };

        let mut values: Vec<Bson> = Vec::new();

        for row in &rows {
            match row.get(field) {
                None | Some(Bson::Null) => {}
                Some(value) => {
                    if !values.contains(value) {
                        values.push(value.clone());
                    }
                }
            }
        }

        Ok(values)
    }

    async fn related_ids(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
    ) -> StoreResult<Option<Vec<Uuid>>> {
        let schema = self
            .registry
            .table(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let relation = schema.relation(relationship).ok_or_else(|| {
            StoreError::UnknownRelationship {
                table: table.to_string(),
                relationship: relationship.to_string(),
            }
        })?;

        if !self.entity_exists(table, id).await {
            return Ok(None);
        }

        match &relation.kind {
            RelationKind::ManyToMany { junction } => {
                let (owner_fk, target_fk) = junction_sides(table, relation.target_table, junction)?;
                let junctions = self.junctions.read().await;
                let match_value: Bson = id.into();

                Ok(Some(
                    junctions
                        .get(junction.table)
                        .map(|rows| {
                            rows.iter()
                                .filter(|row| row.get(owner_fk) == Some(&match_value))
                                .filter_map(|row| row.get(target_fk))
                                .filter_map(bson_to_uuid)
                                .collect()
                        })
                        .unwrap_or_default(),
                ))
            }
            RelationKind::HasMany { foreign_key } => {
                let tables = self.tables.read().await;
                let match_value: Bson = id.into();

                Ok(Some(
                    tables
                        .get(relation.target_table)
                        .map(|rows| {
                            rows.values()
                                .filter(|row| row.get(*foreign_key) == Some(&match_value))
                                .filter_map(|row| row.get("id"))
                                .filter_map(bson_to_uuid)
                                .collect()
                        })
                        .unwrap_or_default(),
                ))
            }
        }
    }

    async fn link(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
        target: Uuid,
    ) -> StoreResult<()> {
        let schema = self
            .registry
            .table(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let relation = schema.relation(relationship).ok_or_else(|| {
            StoreError::UnknownRelationship {
                table: table.to_string(),
                relationship: relationship.to_string(),
            }
        })?;

        if !self.entity_exists(table, id).await {
            return Err(StoreError::EndpointNotFound { table: table.to_string(), id });
        }
        if !self.entity_exists(relation.target_table, target).await {
            return Err(StoreError::EndpointNotFound {
                table: relation.target_table.to_string(),
                id: target,
            });
        }

        match &relation.kind {
            RelationKind::ManyToMany { junction } => {
                let (owner_fk, target_fk) = junction_sides(table, relation.target_table, junction)?;
                let mut junctions = self.junctions.write().await;
                let rows = junctions.entry(junction.table.to_string()).or_default();

                let owner_value: Bson = id.into();
                let target_value: Bson = target.into();
                let linked = rows.iter().any(|row| {
                    row.get(owner_fk) == Some(&owner_value)
                        && row.get(target_fk) == Some(&target_value)
                });

                // Appending an already-linked target is a no-op.
                if !linked {
                    let mut row = Document::new();
                    row.insert(owner_fk, id);
                    row.insert(target_fk, target);
                    apply_defaults(junction, &mut row);
                    rows.push(row);
                }

                Ok(())
            }
            RelationKind::HasMany { foreign_key } => {
                let mut tables = self.tables.write().await;

                if let Some(row) = tables
                    .get_mut(relation.target_table)
                    .and_then(|rows| rows.get_mut(&target.to_string()))
                {
                    row.insert(*foreign_key, id);
                }

                Ok(())
            }
        }
    }

    async fn unlink(
        &self,
        table: &str,
        id: Uuid,
        relationship: &str,
        target: Uuid,
    ) -> StoreResult<()> {
        let schema = self
            .registry
            .table(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let relation = schema.relation(relationship).ok_or_else(|| {
            StoreError::UnknownRelationship {
                table: table.to_string(),
                relationship: relationship.to_string(),
            }
        })?;

        match &relation.kind {
            RelationKind::ManyToMany { junction } => {
                let (owner_fk, target_fk) = junction_sides(table, relation.target_table, junction)?;
                let mut junctions = self.junctions.write().await;

                if let Some(rows) = junctions.get_mut(junction.table) {
                    let owner_value: Bson = id.into();
                    let target_value: Bson = target.into();

                    rows.retain(|row| {
                        !(row.get(owner_fk) == Some(&owner_value)
                            && row.get(target_fk) == Some(&target_value))
                    });
                }

                Ok(())
            }
            RelationKind::HasMany { foreign_key } => {
                let mut tables = self.tables.write().await;
                let owner_value: Bson = id.into();

                if let Some(row) = tables
                    .get_mut(relation.target_table)
                    .and_then(|rows| rows.get_mut(&target.to_string()))
                {
                    if row.get(*foreign_key) == Some(&owner_value) {
                        row.insert(*foreign_key, Bson::Null);
                    }
                }

                Ok(())
            }
        }
    }
}

/// Builder for constructing [`InMemoryEngine`] instances.
#[derive(Debug)]
pub struct InMemoryEngineBuilder {
    registry: Arc<SchemaRegistry>,
}

#[async_trait]
impl EngineBuilder for InMemoryEngineBuilder {
    type Engine = InMemoryEngine;

    /// Builds and returns a new [`InMemoryEngine`] instance.
    ///
    /// This always succeeds and returns a freshly initialized engine.
    async fn build(self) -> StoreResult<Self::Engine> {
        Ok(InMemoryEngine::new(self.registry))
    }
}
