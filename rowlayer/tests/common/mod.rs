//! Shared fixtures for the workspace integration tests.

#![allow(dead_code)]

use bson::Uuid;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use rowlayer::{memory::InMemoryEngine, prelude::*};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub age: i64,
    pub department: Option<String>,
    pub deleted_at: Option<bson::DateTime>,
}

impl Entity for User {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn table() -> &'static str {
        "users"
    }

    fn schema() -> TableSchema {
        TableSchema::new("users")
            .field("name")
            .field("email")
            .field("age")
            .field("department")
            .soft_delete("deleted_at")
            .many_to_many(
                "roles",
                "roles",
                JunctionSchema::new("user_roles")
                    .foreign_key("user_id", "users")
                    .foreign_key("role_id", "roles"),
            )
            .many_to_many(
                "tags",
                "tags",
                JunctionSchema::new("user_tags")
                    .foreign_key("user_id", "users")
                    .foreign_key("tag_id", "tags")
                    .column("assigned_by"),
            )
            .has_many("posts", "posts", "user_id")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

impl Entity for Role {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn table() -> &'static str {
        "roles"
    }

    fn schema() -> TableSchema {
        TableSchema::new("roles").field("name").many_to_many(
            "users",
            "users",
            JunctionSchema::new("user_roles")
                .foreign_key("user_id", "users")
                .foreign_key("role_id", "roles"),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

impl Entity for Tag {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn table() -> &'static str {
        "tags"
    }

    fn schema() -> TableSchema {
        TableSchema::new("tags").field("name").many_to_many(
            "users",
            "users",
            JunctionSchema::new("user_tags")
                .foreign_key("user_id", "users")
                .foreign_key("tag_id", "tags")
                .column("assigned_by"),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub user_id: Option<Uuid>,
}

impl Entity for Post {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn table() -> &'static str {
        "posts"
    }

    fn schema() -> TableSchema {
        TableSchema::new("posts").field("title").field("user_id")
    }
}

pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::builder()
            .register::<User>()
            .register::<Role>()
            .register::<Tag>()
            .register::<Post>()
            .build(),
    )
}

pub fn client() -> StoreClient<InMemoryEngine> {
    let registry = registry();

    StoreClient::new(InMemoryEngine::new(registry.clone()), registry)
}

pub fn user(name: &str, email: Option<&str>, age: i64, department: Option<&str>) -> User {
    User {
        id: Uuid::new(),
        name: name.to_string(),
        email: email.map(str::to_string),
        age,
        department: department.map(str::to_string),
        deleted_at: None,
    }
}

pub fn role(name: &str) -> Role {
    Role { id: Uuid::new(), name: name.to_string() }
}

pub fn tag(name: &str) -> Tag {
    Tag { id: Uuid::new(), name: name.to_string() }
}

pub fn post(title: &str) -> Post {
    Post { id: Uuid::new(), title: title.to_string(), user_id: None }
}
