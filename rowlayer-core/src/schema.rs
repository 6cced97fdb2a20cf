//! Static schema metadata: per-table field registries and declared relationships.
//!
//! Every entity describes its table shape once with [`TableSchema`]; the shapes are
//! assembled into a [`SchemaRegistry`] at client construction and never re-derived.
//! Filter, sort, and prefetch names are validated against the registry, and
//! many-to-many association resolution reads junction metadata from it.

use bson::Bson;
use std::collections::{BTreeMap, BTreeSet};

use crate::entity::Entity;

/// One column of a junction table.
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionColumn {
    /// The column name.
    pub name: &'static str,
    /// The table this column references, when it is a foreign key.
    pub references: Option<&'static str>,
    /// The storage-side default applied when an insert omits this column.
    pub default: Option<Bson>,
}

/// The declared shape of a many-to-many junction table.
///
/// A junction records linked-identity pairs through two foreign-key columns and
/// may carry extra metadata columns. Which extra columns exist determines the
/// relationship-management strategy (see [`crate::association`]).
#[derive(Debug, Clone, PartialEq)]
pub struct JunctionSchema {
    /// The junction table name.
    pub table: &'static str,
    /// All declared columns, in declaration order.
    pub columns: Vec<JunctionColumn>,
}

impl JunctionSchema {
    /// Creates an empty junction declaration for the given table.
    pub fn new(table: &'static str) -> Self {
        Self { table, columns: Vec::new() }
    }

    /// Declares a foreign-key column referencing another table.
    pub fn foreign_key(mut self, name: &'static str, references: &'static str) -> Self {
        self.columns
            .push(JunctionColumn { name, references: Some(references), default: None });
        self
    }

    /// Declares a plain metadata column.
    pub fn column(mut self, name: &'static str) -> Self {
        self.columns
            .push(JunctionColumn { name, references: None, default: None });
        self
    }

    /// Declares a metadata column with a storage-side default value.
    pub fn column_with_default(mut self, name: &'static str, default: impl Into<Bson>) -> Self {
        self.columns
            .push(JunctionColumn { name, references: None, default: Some(default.into()) });
        self
    }

    /// Iterates the foreign-key columns in declaration order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &JunctionColumn> {
        self.columns
            .iter()
            .filter(|column| column.references.is_some())
    }
}

/// How a declared relationship is backed.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
    /// Many-to-many, backed by a junction table.
    ManyToMany {
        /// The junction table's declared shape.
        junction: JunctionSchema,
    },
    /// One-to-many, backed by a foreign-key column on the target table.
    HasMany {
        /// The foreign-key column on the target table.
        foreign_key: &'static str,
    },
}

/// A named relationship declared on a table.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDef {
    /// The relationship attribute name.
    pub name: &'static str,
    /// The related entity's table.
    pub target_table: &'static str,
    /// How the relationship is backed.
    pub kind: RelationKind,
}

/// The declared shape of one entity table.
///
/// A schema always contains the identity field `id`. Additional fields, the
/// optional soft-delete marker, and relationships are declared through the
/// builder methods.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: &'static str,
    fields: BTreeSet<&'static str>,
    soft_delete_field: Option<&'static str>,
    relations: BTreeMap<&'static str, RelationDef>,
}

impl TableSchema {
    /// Creates a schema for the given table, containing only the `id` field.
    pub fn new(name: &'static str) -> Self {
        let mut fields = BTreeSet::new();
        fields.insert("id");

        Self {
            name,
            fields,
            soft_delete_field: None,
            relations: BTreeMap::new(),
        }
    }

    /// Declares a field.
    pub fn field(mut self, name: &'static str) -> Self {
        self.fields.insert(name);
        self
    }

    /// Declares the soft-delete marker field (a nullable timestamp whose
    /// non-null value marks the row as logically deleted).
    ///
    /// The marker is also registered as a regular field.
    pub fn soft_delete(mut self, field: &'static str) -> Self {
        self.fields.insert(field);
        self.soft_delete_field = Some(field);
        self
    }

    /// Declares a many-to-many relationship through a junction table.
    pub fn many_to_many(
        mut self,
        name: &'static str,
        target_table: &'static str,
        junction: JunctionSchema,
    ) -> Self {
        self.relations.insert(
            name,
            RelationDef { name, target_table, kind: RelationKind::ManyToMany { junction } },
        );
        self
    }

    /// Declares a one-to-many relationship through a foreign-key column on the
    /// target table.
    pub fn has_many(
        mut self,
        name: &'static str,
        target_table: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        self.relations.insert(
            name,
            RelationDef { name, target_table, kind: RelationKind::HasMany { foreign_key } },
        );
        self
    }

    /// Returns the table name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the identity field name.
    pub fn id_field(&self) -> &'static str {
        "id"
    }

    /// Returns true when the table declares the given field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Returns the soft-delete marker field, if the table declares one.
    pub fn soft_delete_field(&self) -> Option<&'static str> {
        self.soft_delete_field
    }

    /// Looks up a declared relationship by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    /// Iterates all declared relationships.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations.values()
    }
}

/// The set of all registered table schemas, assembled once at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: BTreeMap<&'static str, TableSchema>,
}

impl SchemaRegistry {
    /// Creates a builder for registering entity schemas.
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Looks up a table schema by name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Looks up the junction declaration owning the given table name, searching
    /// every registered relationship.
    pub fn junction(&self, table: &str) -> Option<&JunctionSchema> {
        self.tables.values().find_map(|schema| {
            schema.relations().find_map(|relation| match &relation.kind {
                RelationKind::ManyToMany { junction } if junction.table == table => Some(junction),
                _ => None,
            })
        })
    }
}

/// Builder for assembling a [`SchemaRegistry`] from entity registrations.
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    tables: BTreeMap<&'static str, TableSchema>,
}

impl SchemaRegistryBuilder {
    /// Registers an entity type's schema.
    pub fn register<T: Entity>(mut self) -> Self {
        self.tables.insert(T::table(), T::schema());
        self
    }

    /// Registers a table schema directly, for tables not represented by an
    /// entity type.
    pub fn register_schema(mut self, schema: TableSchema) -> Self {
        self.tables.insert(schema.name(), schema);
        self
    }

    /// Builds and returns the final registry.
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry { tables: self.tables }
    }
}
