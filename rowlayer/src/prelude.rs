//! Convenient re-exports of commonly used types from rowlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use rowlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entity traits and schema declaration types
//! - The storage-engine trait and builders
//! - Query construction and filtering
//! - Repositories and relationship management
//! - Error types and pagination

pub use rowlayer_core::{
    association::{AssociationDescriptor, METADATA_WHITELIST, StrategyKind},
    client::StoreClient,
    engine::{EngineBuilder, StorageEngine},
    entity::{Entity, EntityExt},
    error::{StoreError, StoreResult},
    filter::{FILTER_OPERATORS, FilterCompiler},
    m2m::{EfficientStrategy, RelationshipManager, SafeStrategy},
    page::{Page, PaginationParams},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    repo::{ListParams, Repository},
    schema::{JunctionSchema, RelationKind, SchemaRegistry, TableSchema},
};
