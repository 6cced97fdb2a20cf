//! Many-to-many association resolution and strategy selection.
//!
//! [`resolve_association`] inspects a declared relationship and, when it is
//! backed by a junction table whose foreign keys can be matched to both
//! endpoint tables, produces an immutable [`AssociationDescriptor`].
//! [`decide_strategy`] then picks between the direct-storage and
//! collection-based relationship implementations from the descriptor's extra
//! columns. Both functions are pure reads over registry metadata; any shape
//! they cannot interpret selects the collection-based path, which is correct
//! for every shape.

use std::collections::BTreeSet;

use crate::schema::{RelationKind, TableSchema};

/// Junction metadata columns that do not disqualify the direct-storage path.
///
/// These columns are populated by storage-side defaults, so inserting only the
/// two foreign-key values leaves them correct. Any other extra column may
/// carry data the direct path cannot supply.
pub const METADATA_WHITELIST: &[&str] = &["created_at", "updated_at", "assigned_at", "tagged_at"];

/// The resolved shape of one many-to-many association.
///
/// Resolved once per relationship and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationDescriptor {
    /// The junction table name.
    pub junction_table: String,
    /// The junction column referencing the owning table.
    pub source_fk: String,
    /// The junction column referencing the related table.
    pub target_fk: String,
    /// Junction columns other than the two foreign keys.
    pub extra_columns: BTreeSet<String>,
}

/// Which relationship-management implementation backs a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Direct junction statements: targeted existence checks, inserts,
    /// deletes, joins, and counts.
    Efficient,
    /// Collection-based: loads the owning entity's full relationship
    /// collection and works in memory, persisting through the entity's
    /// normal save path.
    Safe,
}

impl StrategyKind {
    /// A stable name for diagnostics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Efficient => "EfficientStrategy",
            StrategyKind::Safe => "SafeStrategy",
        }
    }
}

/// Resolves a declared relationship to its junction shape.
///
/// Returns `None` when the relationship does not exist, does not point at
/// `related_table`, is not backed by a junction table (e.g. one-to-many), or
/// when the junction's foreign keys cannot be matched to both endpoint
/// tables. For a self-referential junction the first foreign key in
/// declaration order is taken as the owning side.
pub fn resolve_association(
    owner: &TableSchema,
    related_table: &str,
    relationship: &str,
) -> Option<AssociationDescriptor> {
    let relation = owner.relation(relationship)?;

    if relation.target_table != related_table {
        return None;
    }

    let RelationKind::ManyToMany { junction } = &relation.kind else {
        return None;
    };

    let mut source_fk = None;
    let mut target_fk = None;

    for column in junction.foreign_keys() {
        let Some(references) = column.references else {
            continue;
        };

        if references == owner.name() && source_fk.is_none() {
            source_fk = Some(column.name);
        } else if references == related_table && target_fk.is_none() {
            target_fk = Some(column.name);
        }
    }

    let source_fk = source_fk?;
    let target_fk = target_fk?;

    let extra_columns = junction
        .columns
        .iter()
        .map(|column| column.name)
        .filter(|name| *name != source_fk && *name != target_fk)
        .map(str::to_string)
        .collect();

    Some(AssociationDescriptor {
        junction_table: junction.table.to_string(),
        source_fk: source_fk.to_string(),
        target_fk: target_fk.to_string(),
        extra_columns,
    })
}

/// Decides the relationship-management strategy for a resolved shape.
///
/// An unresolvable association selects [`StrategyKind::Safe`]. A resolved one
/// selects [`StrategyKind::Efficient`] only when every extra junction column
/// is in [`METADATA_WHITELIST`].
pub fn decide_strategy(descriptor: Option<&AssociationDescriptor>) -> StrategyKind {
    match descriptor {
        Some(descriptor)
            if descriptor
                .extra_columns
                .iter()
                .all(|column| METADATA_WHITELIST.contains(&column.as_str())) =>
        {
            StrategyKind::Efficient
        }
        Some(_) => StrategyKind::Safe,
        None => StrategyKind::Safe,
    }
}
