//! Metasync core
//!
//! Domain model shared by every other crate: entity identities, the
//! metadata record types, the cache comparison result, content hashing,
//! and sync configuration.

pub mod comparison;
pub mod config;
pub mod entity;
pub mod hash;

pub use comparison::ComparisonResult;
pub use config::{CatalogEndpoints, ConfigError, SchemaKindMap, SourceKind, SyncConfig};
pub use entity::{
    ColumnInfo, ConstraintKind, DatabaseRecord, EntityId, Record, SchemaRecord, Scope, TableKind,
    TablePayload, TableConstraint, TableRecord,
};
pub use hash::content_hash;
