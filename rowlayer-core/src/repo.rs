//! Typed CRUD repositories over a storage engine.
//!
//! A [`Repository`] couples one entity type with one engine and provides the
//! generic read/write surface: point reads, filtered and searched listings,
//! counts, pagination with totals, soft-delete lifecycle, and bulk
//! single-statement updates and deletes. Every operation runs inside exactly
//! one transactional scope.
//!
//! Filter specifications are compiled by [`FilterCompiler`]; field, sort, and
//! prefetch names are validated against the entity's registered schema and
//! unknown names are checked errors rather than silently dropped.

use bson::{Bson, DateTime, Document, Uuid};
use std::marker::PhantomData;

use crate::{
    engine::{StorageEngine, with_scope},
    entity::{Entity, EntityExt},
    error::{StoreError, StoreResult},
    filter::FilterCompiler,
    page::{Page, PaginationParams},
    query::{Expr, Filter, Query, Sort, SortDirection},
    schema::TableSchema,
};

/// Parameters shared by listing reads.
///
/// `skip` is applied only when greater than zero; a `limit` of zero means
/// unbounded. The sort defaults to the identity field, ascending, and is
/// always applied before the pagination window.
#[derive(Debug, Clone)]
pub struct ListParams {
    /// Number of rows to skip.
    pub skip: usize,
    /// Maximum number of rows to return (0 for all).
    pub limit: usize,
    /// Filter specification (see [`crate::filter`]).
    pub filters: Document,
    /// Field to sort by.
    pub sort_by: String,
    /// Sort descending when true.
    pub sort_desc: bool,
    /// Include soft-deleted rows when true.
    pub include_deleted: bool,
    /// Relationships to prefetch in the same round trip.
    pub prefetch: Vec<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            filters: Document::new(),
            sort_by: "id".to_string(),
            sort_desc: false,
            include_deleted: false,
            prefetch: Vec::new(),
        }
    }
}

/// A typed repository bound to one entity type and one engine.
///
/// Obtained from [`StoreClient::repo`](crate::client::StoreClient::repo).
#[derive(Debug)]
pub struct Repository<'a, E: StorageEngine, T: Entity> {
    engine: &'a E,
    schema: TableSchema,
    _marker: PhantomData<T>,
}

impl<'a, E: StorageEngine, T: Entity> Repository<'a, E, T> {
    pub(crate) fn new(engine: &'a E, schema: TableSchema) -> Self {
        Self { engine, schema, _marker: PhantomData }
    }

    fn unknown_field(&self, field: &str) -> StoreError {
        StoreError::UnknownField {
            table: self.schema.name().to_string(),
            field: field.to_string(),
        }
    }

    fn require_field(&self, field: &str) -> StoreResult<()> {
        if self.schema.has_field(field) {
            Ok(())
        } else {
            Err(self.unknown_field(field))
        }
    }

    fn require_marker(&self) -> StoreResult<&'static str> {
        self.schema
            .soft_delete_field()
            .ok_or_else(|| StoreError::UnsupportedSoftDelete(self.schema.name().to_string()))
    }

    fn validate_changes(&self, changes: &Document) -> StoreResult<()> {
        for field in changes.keys() {
            self.require_field(field)?;
        }

        Ok(())
    }

    fn visibility_clause(&self, include_deleted: bool) -> Option<Expr> {
        match self.schema.soft_delete_field() {
            Some(marker) if !include_deleted => Some(Filter::is_null(marker)),
            _ => None,
        }
    }

    fn id_predicate(&self, id: Uuid, include_deleted: bool) -> Expr {
        let predicate = Filter::eq("id", id);

        match self.visibility_clause(include_deleted) {
            Some(visibility) => predicate.and(visibility),
            None => predicate,
        }
    }

    fn and_all(mut clauses: Vec<Expr>) -> Option<Expr> {
        match clauses.len() {
            0 => None,
            1 => Some(clauses.remove(0)),
            _ => Some(Expr::And(clauses)),
        }
    }

    fn compile_predicate(
        &self,
        filters: &Document,
        include_deleted: bool,
    ) -> StoreResult<Option<Expr>> {
        let mut clauses = FilterCompiler::new(&self.schema).compile(filters)?;

        if let Some(visibility) = self.visibility_clause(include_deleted) {
            clauses.push(visibility);
        }

        Ok(Self::and_all(clauses))
    }

    /// Composes one read query: compiled filters, the optional search OR
    /// group, soft-delete visibility, sort, window, and prefetch hints.
    fn build_query(
        &self,
        params: &ListParams,
        search: Option<(&str, &[&str])>,
    ) -> StoreResult<Query> {
        let mut clauses = FilterCompiler::new(&self.schema).compile(&params.filters)?;

        if let Some((text, fields)) = search {
            let mut conditions = Vec::with_capacity(fields.len());

            for field in fields {
                self.require_field(field)?;
                conditions.push(Filter::ilike(field.to_string(), format!("%{text}%")));
            }

            if !conditions.is_empty() {
                clauses.push(Expr::Or(conditions));
            }
        }

        if let Some(visibility) = self.visibility_clause(params.include_deleted) {
            clauses.push(visibility);
        }

        self.require_field(&params.sort_by)?;

        for relationship in &params.prefetch {
            if self.schema.relation(relationship).is_none() {
                return Err(StoreError::UnknownRelationship {
                    table: self.schema.name().to_string(),
                    relationship: relationship.clone(),
                });
            }
        }

        let mut query = Query::new();
        query.filter = Self::and_all(clauses);
        query.sort = Some(Sort {
            field: params.sort_by.clone(),
            direction: if params.sort_desc { SortDirection::Desc } else { SortDirection::Asc },
        });

        if params.skip > 0 {
            query.offset = Some(params.skip);
        }
        if params.limit > 0 {
            query.limit = Some(params.limit);
        }

        query.prefetch = params.prefetch.clone();

        Ok(query)
    }

    async fn select_entities(&self, query: Query) -> StoreResult<Vec<T>> {
        with_scope(self.engine, async {
            self.engine
                .select(query, T::table())
                .await?
                .into_iter()
                .map(T::from_row)
                .collect()
        })
        .await
    }

    /// Inserts a new entity and returns it.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] when a row with the same identity exists.
    pub async fn insert(&self, entity: T) -> StoreResult<T> {
        let row = entity.to_row()?;

        with_scope(self.engine, async {
            self.engine.insert_rows(T::table(), vec![row]).await?;

            Ok(entity)
        })
        .await
    }

    /// Fetches an entity by identity, hiding soft-deleted rows.
    pub async fn get(&self, id: Uuid) -> StoreResult<Option<T>> {
        self.get_impl(id, false).await
    }

    /// Fetches an entity by identity, including soft-deleted rows.
    pub async fn get_with_deleted(&self, id: Uuid) -> StoreResult<Option<T>> {
        self.get_impl(id, true).await
    }

    async fn get_impl(&self, id: Uuid, include_deleted: bool) -> StoreResult<Option<T>> {
        let mut query = Query::new();
        query.filter = Some(self.id_predicate(id, include_deleted));
        query.limit = Some(1);

        with_scope(self.engine, async {
            self.engine
                .select(query, T::table())
                .await?
                .into_iter()
                .next()
                .map(T::from_row)
                .transpose()
        })
        .await
    }

    /// Lists entities with filtering, sorting, visibility, and a window.
    pub async fn list(&self, params: &ListParams) -> StoreResult<Vec<T>> {
        let query = self.build_query(params, None)?;

        self.select_entities(query).await
    }

    /// Searches entities by case-insensitive substring match across the given
    /// fields; matches from different fields are ORed, then ANDed with the
    /// filters.
    pub async fn search(
        &self,
        text: &str,
        fields: &[&str],
        params: &ListParams,
    ) -> StoreResult<Vec<T>> {
        let query = self.build_query(params, Some((text, fields)))?;

        self.select_entities(query).await
    }

    /// Returns one page of entities together with the total match count.
    ///
    /// The page window overrides any skip/limit in `params`.
    pub async fn paginate(
        &self,
        pagination: &PaginationParams,
        params: &ListParams,
    ) -> StoreResult<Page<T>> {
        let mut query = self.build_query(params, None)?;
        query.offset = Some(pagination.offset());
        query.limit = Some(pagination.per_page);

        let predicate = query.filter.clone();

        with_scope(self.engine, async {
            let total = self.engine.count(T::table(), predicate).await?;
            let items = self
                .engine
                .select(query, T::table())
                .await?
                .into_iter()
                .map(T::from_row)
                .collect::<StoreResult<Vec<T>>>()?;

            Ok(pagination.wrap(items, total))
        })
        .await
    }

    /// Counts entities matching a filter specification.
    pub async fn count(&self, filters: &Document, include_deleted: bool) -> StoreResult<u64> {
        let predicate = self.compile_predicate(filters, include_deleted)?;

        with_scope(self.engine, async {
            self.engine.count(T::table(), predicate).await
        })
        .await
    }

    /// Applies field changes to one entity and returns the updated entity, or
    /// `None` when the identity does not exist (or is soft-deleted).
    pub async fn update(&self, id: Uuid, changes: Document) -> StoreResult<Option<T>> {
        self.validate_changes(&changes)?;

        let predicate = self.id_predicate(id, false);

        with_scope(self.engine, async {
            let affected = self
                .engine
                .update_where(T::table(), Some(predicate), changes)
                .await?;

            if affected == 0 {
                return Ok(None);
            }

            // Re-fetch by plain identity: the changes may have moved the row
            // out of the visibility predicate (soft delete does exactly that).
            let mut query = Query::new();
            query.filter = Some(Filter::eq("id", id));
            query.limit = Some(1);

            self.engine
                .select(query, T::table())
                .await?
                .into_iter()
                .next()
                .map(T::from_row)
                .transpose()
        })
        .await
    }

    /// Hard-deletes one entity. Returns true when a row was removed.
    pub async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        with_scope(self.engine, async {
            let removed = self
                .engine
                .delete_where(T::table(), Some(Filter::eq("id", id)))
                .await?;

            Ok(removed > 0)
        })
        .await
    }

    /// Marks one entity as deleted by setting its soft-delete marker.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnsupportedSoftDelete`] when the entity declares no
    /// marker field.
    pub async fn soft_delete(&self, id: Uuid) -> StoreResult<Option<T>> {
        let marker = self.require_marker()?;

        let mut changes = Document::new();
        changes.insert(marker, DateTime::now());

        self.update(id, changes).await
    }

    /// Restores one soft-deleted entity by clearing its marker. Returns `None`
    /// when the identity does not exist or is not deleted.
    pub async fn restore(&self, id: Uuid) -> StoreResult<Option<T>> {
        let marker = self.require_marker()?;

        let predicate = Filter::eq("id", id).and(Filter::is_not_null(marker));
        let mut changes = Document::new();
        changes.insert(marker, Bson::Null);

        with_scope(self.engine, async {
            let affected = self
                .engine
                .update_where(T::table(), Some(predicate), changes)
                .await?;

            if affected == 0 {
                return Ok(None);
            }

            let mut query = Query::new();
            query.filter = Some(Filter::eq("id", id));
            query.limit = Some(1);

            self.engine
                .select(query, T::table())
                .await?
                .into_iter()
                .next()
                .map(T::from_row)
                .transpose()
        })
        .await
    }

    /// Returns true when any visible entity has the given field value.
    pub async fn exists_by_field(
        &self,
        field: &str,
        value: impl Into<Bson>,
        include_deleted: bool,
    ) -> StoreResult<bool> {
        self.require_field(field)?;

        let predicate = match self.visibility_clause(include_deleted) {
            Some(visibility) => Filter::eq(field, value).and(visibility),
            None => Filter::eq(field, value),
        };

        with_scope(self.engine, async {
            self.engine.exists(T::table(), predicate).await
        })
        .await
    }

    /// Fetches the first entity with the given field value.
    pub async fn get_by_field(
        &self,
        field: &str,
        value: impl Into<Bson>,
        include_deleted: bool,
    ) -> StoreResult<Option<T>> {
        self.require_field(field)?;

        let predicate = match self.visibility_clause(include_deleted) {
            Some(visibility) => Filter::eq(field, value).and(visibility),
            None => Filter::eq(field, value),
        };

        let mut query = Query::new();
        query.filter = Some(predicate);
        query.sort = Some(Sort { field: "id".to_string(), direction: SortDirection::Asc });
        query.limit = Some(1);

        with_scope(self.engine, async {
            self.engine
                .select(query, T::table())
                .await?
                .into_iter()
                .next()
                .map(T::from_row)
                .transpose()
        })
        .await
    }

    /// Lists entities where a field is null (or non-null), with the usual
    /// listing parameters applied on top.
    pub async fn get_by_null_field(
        &self,
        field: &str,
        is_null: bool,
        params: &ListParams,
    ) -> StoreResult<Vec<T>> {
        self.require_field(field)?;

        let mut query = self.build_query(params, None)?;
        let clause = Expr::IsNull(field.to_string(), is_null);
        query.filter = Some(match query.filter.take() {
            Some(filter) => filter.and(clause),
            None => clause,
        });

        self.select_entities(query).await
    }

    /// Returns the distinct non-null values of a field.
    pub async fn distinct_values(
        &self,
        field: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<Bson>> {
        self.require_field(field)?;

        let mut clauses = vec![Filter::is_not_null(field)];

        if let Some(visibility) = self.visibility_clause(include_deleted) {
            clauses.push(visibility);
        }

        let predicate = Self::and_all(clauses);

        with_scope(self.engine, async {
            self.engine.distinct(T::table(), field, predicate).await
        })
        .await
    }

    /// Applies field changes to every entity matching the filters as a single
    /// statement. Returns the number of rows updated.
    pub async fn update_where(
        &self,
        changes: Document,
        filters: &Document,
        include_deleted: bool,
    ) -> StoreResult<u64> {
        self.validate_changes(&changes)?;

        let predicate = self.compile_predicate(filters, include_deleted)?;

        with_scope(self.engine, async {
            self.engine.update_where(T::table(), predicate, changes).await
        })
        .await
    }

    /// Hard-deletes every entity matching the filters as a single statement.
    /// Returns the number of rows deleted.
    pub async fn delete_where(&self, filters: &Document) -> StoreResult<u64> {
        let clauses = FilterCompiler::new(&self.schema).compile(filters)?;
        let predicate = Self::and_all(clauses);

        with_scope(self.engine, async {
            self.engine.delete_where(T::table(), predicate).await
        })
        .await
    }

    /// Soft-deletes every visible entity matching the filters. Returns the
    /// number of rows marked.
    pub async fn soft_delete_where(&self, filters: &Document) -> StoreResult<u64> {
        let marker = self.require_marker()?;

        let mut changes = Document::new();
        changes.insert(marker, DateTime::now());

        self.update_where(changes, filters, false).await
    }

    /// Restores every soft-deleted entity matching the filters. Returns the
    /// number of rows restored.
    pub async fn restore_where(&self, filters: &Document) -> StoreResult<u64> {
        let marker = self.require_marker()?;

        let mut clauses = FilterCompiler::new(&self.schema).compile(filters)?;
        clauses.push(Filter::is_not_null(marker));
        let predicate = Self::and_all(clauses);

        let mut changes = Document::new();
        changes.insert(marker, Bson::Null);

        with_scope(self.engine, async {
            self.engine.update_where(T::table(), predicate, changes).await
        })
        .await
    }
}
