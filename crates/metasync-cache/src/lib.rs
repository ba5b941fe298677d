//! Runtime metadata caches and the snapshot diff engine
//!
//! This crate holds:
//! - `MetadataStore`: the long-lived "last synchronized" cache, one store
//!   per metadata kind, with one cache per (schema, service) scope
//! - `MetadataSource` / `Snapshot`: the ephemeral per-cycle materialization
//!   of the authoritative relational rows
//! - `diff`: the content-hash comparison between the two

pub mod diff;
pub mod snapshot;
pub mod store;

pub use diff::compare;
pub use snapshot::{MetadataSource, Snapshot, SourceError};
pub use store::MetadataStore;
