//! View SQL lineage extraction
//!
//! This crate handles:
//! - Parsing a view's SQL definition into the alias map, upstream table
//!   list and SELECT-list column mappings
//! - Resolving those references against cached table metadata into
//!   fully-qualified column lineage, one upstream entry per table
//!
//! Parsing and resolution are pure, synchronous computation; catalog
//! identity resolution and edge pushing live in the engine crate.

pub mod parser;
pub mod resolver;

pub use parser::{parse_view_sql, ColumnMapping, ColumnRef, LineageParseError, ParsedLineage, TableRef};
pub use resolver::{
    resolve_view_lineage, ColumnLineage, ResolvedViewLineage, TableLookup, UpstreamLineage,
};
