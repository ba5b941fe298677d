//! External metadata-catalog boundary
//!
//! The `CatalogClient` trait is the seam between reconciliation and the
//! catalog service: idempotent PUT upserts keyed by FQN, recursive
//! delete-by-name, the protected-entity flag lookup with its three-way
//! outcome, opaque id resolution for lineage, and lineage edge pushes.
//!
//! `HttpCatalog` is the reqwest implementation; `MockCatalog` is the test
//! double with call recording and scripted outcomes.

pub mod client;
pub mod dto;
pub mod http;
pub mod mapper;
pub mod mock;

pub use client::{
    CatalogClient, CatalogError, CuratedLookup, EntityKind, StaticTokenProvider, TokenProvider,
};
pub use dto::{
    ColumnDto, ColumnsLineage, ConstraintDto, DatabaseDto, EntityReference, LineageDetails,
    LineageEdge, LineageRequest, LineageSource, SchemaDto, TableDto,
};
pub use http::HttpCatalog;
pub use mapper::{database_dto, schema_dto, table_dto};
pub use mock::{CatalogCall, FailingTokenProvider, MockCatalog};
