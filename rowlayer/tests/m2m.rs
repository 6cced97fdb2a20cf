//! Relationship management: strategy selection, the seven-operation contract,
//! idempotency, and duplicate-key absorption.

mod common;

use bson::doc;
use common::{Post, Role, Tag, User, client, post, role, tag, user};
use rowlayer::prelude::*;

#[tokio::test]
async fn strategy_selection_follows_the_junction_shape() {
    let client = client();

    // Two foreign keys only: the direct-storage path is legal.
    let roles = client.relationship::<User, Role>("roles", "users");
    assert_eq!(roles.strategy_kind(), StrategyKind::Efficient);

    // An extra non-whitelisted column disqualifies it.
    let tags = client.relationship::<User, Tag>("tags", "users");
    assert_eq!(tags.strategy_kind(), StrategyKind::Safe);

    // Not junction-backed at all: fail open toward correctness.
    let posts = client.relationship::<User, Post>("posts", "author");
    assert_eq!(posts.strategy_kind(), StrategyKind::Safe);

    // Unknown relationship name: unresolvable, same fallback.
    let unknown = client.relationship::<User, Role>("rolls", "users");
    assert_eq!(unknown.strategy_kind(), StrategyKind::Safe);
}

#[tokio::test]
async fn efficient_strategy_contract() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");
    assert_eq!(manager.strategy_kind(), StrategyKind::Efficient);

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();

    assert!(!manager.relationship_exists(alice.id, admin.id).await.unwrap());

    let owner = manager.add_relationship(alice.id, admin.id).await.unwrap();
    assert_eq!(owner.id, alice.id);

    assert!(manager.relationship_exists(alice.id, admin.id).await.unwrap());
    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 1);
    assert_eq!(manager.count_sources_for_target(admin.id).await.unwrap(), 1);

    let related = manager.get_related_for_source(alice.id, 0, 0).await.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id, admin.id);

    let sources = manager.get_sources_for_target(admin.id, 0, 0).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, alice.id);

    manager.remove_relationship(alice.id, admin.id).await.unwrap();
    assert!(!manager.relationship_exists(alice.id, admin.id).await.unwrap());
    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 0);
}

#[tokio::test]
async fn safe_strategy_contract() {
    let client = client();
    let users = client.repo::<User>();
    let tags = client.repo::<Tag>();
    let manager = client.relationship::<User, Tag>("tags", "users");
    assert_eq!(manager.strategy_kind(), StrategyKind::Safe);

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let urgent = tags.insert(tag("urgent")).await.unwrap();

    assert!(!manager.relationship_exists(alice.id, urgent.id).await.unwrap());

    manager.add_relationship(alice.id, urgent.id).await.unwrap();

    assert!(manager.relationship_exists(alice.id, urgent.id).await.unwrap());
    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 1);
    assert_eq!(manager.count_sources_for_target(urgent.id).await.unwrap(), 1);

    let related = manager.get_related_for_source(alice.id, 0, 0).await.unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id, urgent.id);

    let sources = manager.get_sources_for_target(urgent.id, 0, 0).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].id, alice.id);

    manager.remove_relationship(alice.id, urgent.id).await.unwrap();
    assert!(!manager.relationship_exists(alice.id, urgent.id).await.unwrap());
}

#[tokio::test]
async fn add_relationship_is_idempotent() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();

    manager.add_relationship(alice.id, admin.id).await.unwrap();
    manager.add_relationship(alice.id, admin.id).await.unwrap();

    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 1);
}

#[tokio::test]
async fn remove_of_an_unlinked_pair_is_a_no_op_success() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();

    let owner = manager.remove_relationship(alice.id, admin.id).await.unwrap();
    assert_eq!(owner.id, alice.id);
}

#[tokio::test]
async fn missing_endpoints_are_explicit_errors_on_writes() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();
    let ghost = bson::Uuid::new();

    for manager in [
        client.relationship::<User, Role>("roles", "users"),
    ] {
        let err = manager.add_relationship(ghost, admin.id).await.unwrap_err();
        assert!(matches!(err, StoreError::EndpointNotFound { ref table, id } if table == "users" && id == ghost));

        let err = manager.add_relationship(alice.id, ghost).await.unwrap_err();
        assert!(matches!(err, StoreError::EndpointNotFound { ref table, id } if table == "roles" && id == ghost));

        let err = manager.remove_relationship(ghost, admin.id).await.unwrap_err();
        assert!(matches!(err, StoreError::EndpointNotFound { .. }));

        // Reads treat missing endpoints as empty, not as failures.
        assert!(!manager.relationship_exists(ghost, admin.id).await.unwrap());
        assert!(manager.get_related_for_source(ghost, 0, 0).await.unwrap().is_empty());
        assert_eq!(manager.count_related_for_source(ghost).await.unwrap(), 0);
    }

    let safe = client.relationship::<User, Tag>("tags", "users");
    let err = safe.add_relationship(ghost, admin.id).await.unwrap_err();
    assert!(matches!(err, StoreError::EndpointNotFound { ref table, .. } if table == "users"));
    assert!(!safe.relationship_exists(ghost, admin.id).await.unwrap());
}

#[tokio::test]
async fn concurrent_duplicate_links_are_absorbed() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();

    // Another writer already inserted the junction row.
    client
        .engine()
        .insert_rows("user_roles", vec![doc! { "user_id": alice.id, "role_id": admin.id }])
        .await
        .unwrap();

    // A raw duplicate insert surfaces the uniqueness violation...
    let err = client
        .engine()
        .insert_rows("user_roles", vec![doc! { "user_id": alice.id, "role_id": admin.id }])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)));

    // ...but add_relationship absorbs it as idempotent success.
    manager.add_relationship(alice.id, admin.id).await.unwrap();
    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 1);
}

/// Engine double that reports every junction pair as unlinked, so an add
/// always races its insert against rows that are already there.
#[derive(Debug)]
struct RacingEngine {
    inner: rowlayer::memory::InMemoryEngine,
}

#[async_trait::async_trait]
impl StorageEngine for RacingEngine {
    async fn begin(&self) -> StoreResult<()> {
        self.inner.begin().await
    }

    async fn commit(&self) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback().await
    }

    async fn insert_rows(&self, table: &str, rows: Vec<bson::Document>) -> StoreResult<()> {
        self.inner.insert_rows(table, rows).await
    }

    async fn fetch_rows(&self, table: &str, ids: Vec<bson::Uuid>) -> StoreResult<Vec<bson::Document>> {
        self.inner.fetch_rows(table, ids).await
    }

    async fn select(&self, query: Query, table: &str) -> StoreResult<Vec<bson::Document>> {
        self.inner.select(query, table).await
    }

    async fn count(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64> {
        self.inner.count(table, predicate).await
    }

    async fn exists(&self, table: &str, predicate: Expr) -> StoreResult<bool> {
        if table == "user_roles" {
            return Ok(false);
        }

        self.inner.exists(table, predicate).await
    }

    async fn update_where(
        &self,
        table: &str,
        predicate: Option<Expr>,
        changes: bson::Document,
    ) -> StoreResult<u64> {
        self.inner.update_where(table, predicate, changes).await
    }

    async fn delete_where(&self, table: &str, predicate: Option<Expr>) -> StoreResult<u64> {
        self.inner.delete_where(table, predicate).await
    }

    async fn distinct(
        &self,
        table: &str,
        field: &str,
        predicate: Option<Expr>,
    ) -> StoreResult<Vec<bson::Bson>> {
        self.inner.distinct(table, field, predicate).await
    }

    async fn related_ids(
        &self,
        table: &str,
        id: bson::Uuid,
        relationship: &str,
    ) -> StoreResult<Option<Vec<bson::Uuid>>> {
        self.inner.related_ids(table, id, relationship).await
    }

    async fn link(
        &self,
        table: &str,
        id: bson::Uuid,
        relationship: &str,
        target: bson::Uuid,
    ) -> StoreResult<()> {
        self.inner.link(table, id, relationship, target).await
    }

    async fn unlink(
        &self,
        table: &str,
        id: bson::Uuid,
        relationship: &str,
        target: bson::Uuid,
    ) -> StoreResult<()> {
        self.inner.unlink(table, id, relationship, target).await
    }
}

#[tokio::test]
async fn a_lost_insert_race_is_treated_as_success() {
    use rowlayer::association::resolve_association;

    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();

    client
        .engine()
        .insert_rows("user_roles", vec![doc! { "user_id": alice.id, "role_id": admin.id }])
        .await
        .unwrap();

    let descriptor =
        resolve_association(client.registry().table("users").unwrap(), "roles", "roles").unwrap();
    let strategy = EfficientStrategy::new(descriptor);

    // The double never sees the existing link, so the strategy's insert hits
    // the composite key; the conflict must be absorbed, not surfaced.
    let racing = RacingEngine { inner: client.engine().clone() };
    let owner: User = strategy
        .add_relationship::<RacingEngine, User, Role>(&racing, alice.id, admin.id)
        .await
        .unwrap();
    assert_eq!(owner.id, alice.id);

    assert_eq!(
        strategy.count_related_for_source(client.engine(), alice.id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn has_many_relationships_work_through_the_safe_path() {
    let client = client();
    let users = client.repo::<User>();
    let posts = client.repo::<Post>();
    let manager = client.relationship::<User, Post>("posts", "author");
    assert_eq!(manager.strategy_kind(), StrategyKind::Safe);

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let draft = posts.insert(post("draft")).await.unwrap();

    manager.add_relationship(alice.id, draft.id).await.unwrap();

    assert!(manager.relationship_exists(alice.id, draft.id).await.unwrap());
    assert_eq!(manager.count_related_for_source(alice.id).await.unwrap(), 1);

    let related = manager.get_related_for_source(alice.id, 0, 0).await.unwrap();
    assert_eq!(related[0].user_id, Some(alice.id));

    manager.remove_relationship(alice.id, draft.id).await.unwrap();
    assert!(!manager.relationship_exists(alice.id, draft.id).await.unwrap());

    let unlinked = posts.get(draft.id).await.unwrap().unwrap();
    assert_eq!(unlinked.user_id, None);
}

#[tokio::test]
async fn retrieval_windows_are_ordered_by_identity() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();

    let mut fixture_roles = Vec::new();
    for i in 0..5 {
        let created = roles.insert(role(&format!("role-{i}"))).await.unwrap();
        manager.add_relationship(alice.id, created.id).await.unwrap();
        fixture_roles.push(created);
    }
    fixture_roles.sort_by(|a, b| a.id.bytes().cmp(&b.id.bytes()));

    let all = manager.get_related_for_source(alice.id, 0, 0).await.unwrap();
    let all_ids: Vec<_> = all.iter().map(|found| found.id).collect();
    let expected_ids: Vec<_> = fixture_roles.iter().map(|fixture| fixture.id).collect();
    assert_eq!(all_ids, expected_ids);

    let window = manager.get_related_for_source(alice.id, 1, 2).await.unwrap();
    let window_ids: Vec<_> = window.iter().map(|found| found.id).collect();
    assert_eq!(window_ids, expected_ids[1..3].to_vec());
}

#[tokio::test]
async fn related_visibility_is_layered_by_the_caller() {
    let client = client();
    let users = client.repo::<User>();
    let roles = client.repo::<Role>();
    let manager = client.relationship::<User, Role>("roles", "users");

    let alice = users.insert(user("Alice", None, 30, None)).await.unwrap();
    let admin = roles.insert(role("admin")).await.unwrap();
    manager.add_relationship(alice.id, admin.id).await.unwrap();

    users.soft_delete(alice.id).await.unwrap();

    // Relationship management does not apply soft-delete visibility; the
    // deleted owner still counts and appears.
    assert_eq!(manager.count_sources_for_target(admin.id).await.unwrap(), 1);
    let sources = manager.get_sources_for_target(admin.id, 0, 0).await.unwrap();
    assert_eq!(sources.len(), 1);

    // Callers layer visibility as an application-level filter.
    let visible: Vec<_> = sources
        .into_iter()
        .filter(|source| source.deleted_at.is_none())
        .collect();
    assert!(visible.is_empty());
}
