//! Many-to-many relationship management.
//!
//! A [`RelationshipManager`] exposes a seven-operation contract over one
//! declared many-to-many relationship: add, remove, existence, retrieval in
//! both directions, and counting in both directions. At construction it
//! resolves the relationship's junction shape once (see
//! [`crate::association`]) and selects one of two interchangeable
//! implementations:
//!
//! - [`EfficientStrategy`] issues targeted junction statements: single
//!   existence probes, a two-column insert, predicate deletes, junction joins
//!   with the window pushed to the engine, and single COUNT queries.
//! - [`SafeStrategy`] loads the owning entity's entire live relationship
//!   collection through the engine's collection persistence path and works in
//!   memory. This is O(n) in relation cardinality but correct for any junction
//!   shape, including junctions with extra data columns.
//!
//! Both strategies return identical results for existence, counting, and
//! retrieval whenever the junction shape qualifies for either. The selected
//! strategy is stored in an immutable field and exposed through
//! [`RelationshipManager::strategy_kind`] for diagnostics.
//!
//! Soft-delete visibility of related entities is deliberately not applied
//! here; callers layer visibility policy on top of relationship management.

use bson::{Document, Uuid};
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::{
    association::{AssociationDescriptor, StrategyKind, decide_strategy, resolve_association},
    engine::{StorageEngine, with_scope},
    entity::{Entity, EntityExt},
    error::{StoreError, StoreResult},
    query::{Expr, Filter, JunctionJoin, Query, Sort, SortDirection},
    schema::SchemaRegistry,
};

/// Verifies that an endpoint row exists, without materializing it.
async fn ensure_endpoint<E>(engine: &E, table: &str, id: Uuid) -> StoreResult<()>
where
    E: StorageEngine,
{
    if engine.exists(table, Filter::eq("id", id)).await? {
        Ok(())
    } else {
        warn!(table, %id, "relationship endpoint not found");
        Err(StoreError::EndpointNotFound { table: table.to_string(), id })
    }
}

/// Fetches one entity by identity, erroring when the row has vanished.
async fn fetch_entity<E, T>(engine: &E, id: Uuid) -> StoreResult<T>
where
    E: StorageEngine,
    T: Entity,
{
    let row = engine
        .fetch_rows(T::table(), vec![id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::EndpointNotFound { table: T::table().to_string(), id })?;

    T::from_row(row)
}

/// Applies the skip/limit window over an in-memory collection.
///
/// A `skip` of 0 skips nothing and a `limit` of 0 means unbounded, matching
/// the engine-side window semantics.
fn window<T>(items: Vec<T>, skip: usize, limit: usize) -> Vec<T> {
    let iter = items.into_iter().skip(skip);

    if limit > 0 {
        iter.take(limit).collect()
    } else {
        iter.collect()
    }
}

/// Direct-storage relationship implementation.
///
/// Applicable only when both foreign keys of the junction are resolved and no
/// disqualifying extra column exists. Never loads a relationship collection;
/// every operation is one targeted statement plus, for writes, lightweight
/// endpoint existence checks.
#[derive(Debug, Clone)]
pub struct EfficientStrategy {
    assoc: AssociationDescriptor,
}

impl EfficientStrategy {
    /// Creates the strategy over a resolved association shape.
    pub fn new(assoc: AssociationDescriptor) -> Self {
        Self { assoc }
    }

    fn pair_predicate(&self, source_id: Uuid, target_id: Uuid) -> Expr {
        Filter::eq(self.assoc.source_fk.clone(), source_id)
            .and(Filter::eq(self.assoc.target_fk.clone(), target_id))
    }

    fn junction_row(&self, source_id: Uuid, target_id: Uuid) -> Document {
        let mut row = Document::new();
        row.insert(self.assoc.source_fk.clone(), source_id);
        row.insert(self.assoc.target_fk.clone(), target_id);
        row
    }

    fn related_query(&self, match_column: &str, match_id: Uuid, join_column: &str, skip: usize, limit: usize) -> Query {
        let mut query = Query::new();
        query.join = Some(JunctionJoin {
            junction_table: self.assoc.junction_table.clone(),
            match_column: match_column.to_string(),
            match_id,
            join_column: join_column.to_string(),
        });
        query.sort = Some(Sort { field: "id".to_string(), direction: SortDirection::Asc });

        if skip > 0 {
            query.offset = Some(skip);
        }
        if limit > 0 {
            query.limit = Some(limit);
        }

        query
    }

    pub async fn relationship_exists<E>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<bool>
    where
        E: StorageEngine,
    {
        with_scope(engine, async {
            engine
                .exists(&self.assoc.junction_table, self.pair_predicate(source_id, target_id))
                .await
        })
        .await
    }

    pub async fn add_relationship<E, S, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<S>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            ensure_endpoint(engine, S::table(), source_id).await?;
            ensure_endpoint(engine, T::table(), target_id).await?;

            let linked = engine
                .exists(&self.assoc.junction_table, self.pair_predicate(source_id, target_id))
                .await?;

            if !linked {
                // A concurrent insert of the same pair loses the race on the
                // junction's composite key; that conflict is this operation's
                // success, not a failure.
                match engine
                    .insert_rows(
                        &self.assoc.junction_table,
                        vec![self.junction_row(source_id, target_id)],
                    )
                    .await
                {
                    Err(StoreError::DuplicateKey(table)) => {
                        debug!(junction = %table, "duplicate link absorbed");
                    }
                    other => other?,
                }
            }

            fetch_entity::<E, S>(engine, source_id).await
        })
        .await
    }

    pub async fn remove_relationship<E, S, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<S>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            ensure_endpoint(engine, S::table(), source_id).await?;
            ensure_endpoint(engine, T::table(), target_id).await?;

            // Zero deleted rows means the pair was never linked; that is a
            // no-op success.
            engine
                .delete_where(
                    &self.assoc.junction_table,
                    Some(self.pair_predicate(source_id, target_id)),
                )
                .await?;

            fetch_entity::<E, S>(engine, source_id).await
        })
        .await
    }

    pub async fn get_related_for_source<E, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<T>>
    where
        E: StorageEngine,
        T: Entity,
    {
        let query =
            self.related_query(&self.assoc.source_fk, source_id, &self.assoc.target_fk, skip, limit);

        with_scope(engine, async {
            engine
                .select(query, T::table())
                .await?
                .into_iter()
                .map(T::from_row)
                .collect()
        })
        .await
    }

    pub async fn get_sources_for_target<E, S>(
        &self,
        engine: &E,
        target_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<S>>
    where
        E: StorageEngine,
        S: Entity,
    {
        let query =
            self.related_query(&self.assoc.target_fk, target_id, &self.assoc.source_fk, skip, limit);

        with_scope(engine, async {
            engine
                .select(query, S::table())
                .await?
                .into_iter()
                .map(S::from_row)
                .collect()
        })
        .await
    }

    pub async fn count_related_for_source<E>(&self, engine: &E, source_id: Uuid) -> StoreResult<u64>
    where
        E: StorageEngine,
    {
        with_scope(engine, async {
            engine
                .count(
                    &self.assoc.junction_table,
                    Some(Filter::eq(self.assoc.source_fk.clone(), source_id)),
                )
                .await
        })
        .await
    }

    pub async fn count_sources_for_target<E>(&self, engine: &E, target_id: Uuid) -> StoreResult<u64>
    where
        E: StorageEngine,
    {
        with_scope(engine, async {
            engine
                .count(
                    &self.assoc.junction_table,
                    Some(Filter::eq(self.assoc.target_fk.clone(), target_id)),
                )
                .await
        })
        .await
    }
}

/// Collection-based relationship implementation.
///
/// Loads the owning entity's entire live relationship collection through the
/// engine's collection persistence path, tests membership, counts, and
/// paginates in memory, and persists mutations through the owning entity's
/// normal save path. Used whenever the junction shape disqualifies the direct
/// path or cannot be resolved at all.
#[derive(Debug, Clone)]
pub struct SafeStrategy {
    source_attr: &'static str,
    target_attr: &'static str,
}

impl SafeStrategy {
    /// Creates the strategy over the relationship attribute names.
    pub fn new(source_attr: &'static str, target_attr: &'static str) -> Self {
        Self { source_attr, target_attr }
    }

    pub async fn relationship_exists<E, S>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<bool>
    where
        E: StorageEngine,
        S: Entity,
    {
        with_scope(engine, async {
            Ok(engine
                .related_ids(S::table(), source_id, self.source_attr)
                .await?
                .is_some_and(|ids| ids.contains(&target_id)))
        })
        .await
    }

    pub async fn add_relationship<E, S, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<S>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            let collection = engine
                .related_ids(S::table(), source_id, self.source_attr)
                .await?
                .ok_or_else(|| StoreError::EndpointNotFound {
                    table: S::table().to_string(),
                    id: source_id,
                })?;

            ensure_endpoint(engine, T::table(), target_id).await?;

            if !collection.contains(&target_id) {
                engine
                    .link(S::table(), source_id, self.source_attr, target_id)
                    .await?;
            }

            fetch_entity::<E, S>(engine, source_id).await
        })
        .await
    }

    pub async fn remove_relationship<E, S, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        target_id: Uuid,
    ) -> StoreResult<S>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            let collection = engine
                .related_ids(S::table(), source_id, self.source_attr)
                .await?
                .ok_or_else(|| StoreError::EndpointNotFound {
                    table: S::table().to_string(),
                    id: source_id,
                })?;

            ensure_endpoint(engine, T::table(), target_id).await?;

            if collection.contains(&target_id) {
                engine
                    .unlink(S::table(), source_id, self.source_attr, target_id)
                    .await?;
            }

            fetch_entity::<E, S>(engine, source_id).await
        })
        .await
    }

    pub async fn get_related_for_source<E, S, T>(
        &self,
        engine: &E,
        source_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<T>>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            let Some(ids) = engine
                .related_ids(S::table(), source_id, self.source_attr)
                .await?
            else {
                return Ok(Vec::new());
            };

            // The whole collection is materialized before the window is
            // applied; this is the cost of the shape-agnostic path.
            let mut related = engine
                .fetch_rows(T::table(), ids)
                .await?
                .into_iter()
                .map(T::from_row)
                .collect::<StoreResult<Vec<T>>>()?;

            // Identity byte order matches the engine-side sort on `id`.
            related.sort_by(|a, b| a.id().bytes().cmp(&b.id().bytes()));

            Ok(window(related, skip, limit))
        })
        .await
    }

    pub async fn get_sources_for_target<E, S, T>(
        &self,
        engine: &E,
        target_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<S>>
    where
        E: StorageEngine,
        S: Entity,
        T: Entity,
    {
        with_scope(engine, async {
            let Some(ids) = engine
                .related_ids(T::table(), target_id, self.target_attr)
                .await?
            else {
                return Ok(Vec::new());
            };

            let mut sources = engine
                .fetch_rows(S::table(), ids)
                .await?
                .into_iter()
                .map(S::from_row)
                .collect::<StoreResult<Vec<S>>>()?;

            sources.sort_by(|a, b| a.id().bytes().cmp(&b.id().bytes()));

            Ok(window(sources, skip, limit))
        })
        .await
    }

    pub async fn count_related_for_source<E, S>(
        &self,
        engine: &E,
        source_id: Uuid,
    ) -> StoreResult<u64>
    where
        E: StorageEngine,
        S: Entity,
    {
        with_scope(engine, async {
            Ok(engine
                .related_ids(S::table(), source_id, self.source_attr)
                .await?
                .map_or(0, |ids| ids.len() as u64))
        })
        .await
    }

    pub async fn count_sources_for_target<E, T>(
        &self,
        engine: &E,
        target_id: Uuid,
    ) -> StoreResult<u64>
    where
        E: StorageEngine,
        T: Entity,
    {
        with_scope(engine, async {
            Ok(engine
                .related_ids(T::table(), target_id, self.target_attr)
                .await?
                .map_or(0, |ids| ids.len() as u64))
        })
        .await
    }
}

enum Backing {
    Efficient(EfficientStrategy),
    Safe(SafeStrategy),
}

/// Façade over one many-to-many relationship between two entity types.
///
/// Constructed with the relationship attribute name on each side. The backing
/// strategy is selected once at construction from the junction shape and never
/// changes; all seven operations are pass-throughs to it.
///
/// # Example
///
/// ```ignore
/// let roles = client.relationship::<User, Role>("roles", "users");
///
/// roles.add_relationship(user_id, role_id).await?;
/// assert!(roles.relationship_exists(user_id, role_id).await?);
/// ```
pub struct RelationshipManager<'a, E, S, T>
where
    E: StorageEngine,
    S: Entity,
    T: Entity,
{
    engine: &'a E,
    backing: Backing,
    _entities: PhantomData<(S, T)>,
}

impl<'a, E, S, T> RelationshipManager<'a, E, S, T>
where
    E: StorageEngine,
    S: Entity,
    T: Entity,
{
    /// Creates a manager for the relationship named `source_attr` on the
    /// owning side and `target_attr` on the related side.
    ///
    /// Resolves the association and decides the strategy exactly once; an
    /// unresolvable association falls back to the collection-based strategy
    /// rather than erroring.
    pub fn new(
        engine: &'a E,
        registry: &SchemaRegistry,
        source_attr: &'static str,
        target_attr: &'static str,
    ) -> Self {
        let descriptor = registry
            .table(S::table())
            .and_then(|owner| resolve_association(owner, T::table(), source_attr));
        let kind = decide_strategy(descriptor.as_ref());

        debug!(
            source = S::table(),
            target = T::table(),
            relationship = source_attr,
            strategy = kind.as_str(),
            "relationship strategy selected"
        );

        let backing = match (kind, descriptor) {
            (StrategyKind::Efficient, Some(assoc)) => {
                Backing::Efficient(EfficientStrategy::new(assoc))
            }
            _ => Backing::Safe(SafeStrategy::new(source_attr, target_attr)),
        };

        Self { engine, backing, _entities: PhantomData }
    }

    /// The strategy selected at construction, for diagnostics.
    pub fn strategy_kind(&self) -> StrategyKind {
        match &self.backing {
            Backing::Efficient(_) => StrategyKind::Efficient,
            Backing::Safe(_) => StrategyKind::Safe,
        }
    }

    /// Links two endpoints and returns the owning entity.
    ///
    /// Idempotent: linking an already-linked pair leaves exactly one link and
    /// succeeds.
    ///
    /// # Errors
    ///
    /// [`StoreError::EndpointNotFound`] when either identity does not exist.
    pub async fn add_relationship(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<S> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .add_relationship::<E, S, T>(self.engine, source_id, target_id)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .add_relationship::<E, S, T>(self.engine, source_id, target_id)
                    .await
            }
        }
    }

    /// Unlinks two endpoints and returns the owning entity.
    ///
    /// Removing a link that does not exist is a no-op success.
    ///
    /// # Errors
    ///
    /// [`StoreError::EndpointNotFound`] when either identity does not exist.
    pub async fn remove_relationship(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<S> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .remove_relationship::<E, S, T>(self.engine, source_id, target_id)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .remove_relationship::<E, S, T>(self.engine, source_id, target_id)
                    .await
            }
        }
    }

    /// Returns true when the pair is linked. Missing endpoints read as
    /// unlinked.
    pub async fn relationship_exists(&self, source_id: Uuid, target_id: Uuid) -> StoreResult<bool> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .relationship_exists(self.engine, source_id, target_id)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .relationship_exists::<E, S>(self.engine, source_id, target_id)
                    .await
            }
        }
    }

    /// The related entities of one owning entity, ordered by identity, with
    /// the skip/limit window applied. A missing owner yields an empty list.
    pub async fn get_related_for_source(
        &self,
        source_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<T>> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .get_related_for_source(self.engine, source_id, skip, limit)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .get_related_for_source::<E, S, T>(self.engine, source_id, skip, limit)
                    .await
            }
        }
    }

    /// The owning entities linked to one related entity, ordered by identity,
    /// with the skip/limit window applied. A missing target yields an empty
    /// list.
    pub async fn get_sources_for_target(
        &self,
        target_id: Uuid,
        skip: usize,
        limit: usize,
    ) -> StoreResult<Vec<S>> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .get_sources_for_target(self.engine, target_id, skip, limit)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .get_sources_for_target::<E, S, T>(self.engine, target_id, skip, limit)
                    .await
            }
        }
    }

    /// Counts the related entities of one owning entity.
    pub async fn count_related_for_source(&self, source_id: Uuid) -> StoreResult<u64> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .count_related_for_source(self.engine, source_id)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .count_related_for_source::<E, S>(self.engine, source_id)
                    .await
            }
        }
    }

    /// Counts the owning entities linked to one related entity.
    pub async fn count_sources_for_target(&self, target_id: Uuid) -> StoreResult<u64> {
        match &self.backing {
            Backing::Efficient(strategy) => {
                strategy
                    .count_sources_for_target(self.engine, target_id)
                    .await
            }
            Backing::Safe(strategy) => {
                strategy
                    .count_sources_for_target::<E, T>(self.engine, target_id)
                    .await
            }
        }
    }
}
