//! Catalog client trait and error taxonomy

use crate::dto::{DatabaseDto, LineageRequest, SchemaDto, TableDto};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from catalog calls. "Not found" is never an error: the lookups
/// that can encounter it return a distinguished value instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("catalog returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("token acquisition failed: {0}")]
    Token(String),

    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

/// Metadata kind, as addressed by the catalog's endpoint paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Database,
    Schema,
    Table,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Table => "table",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the protected-entity flag lookup.
///
/// The three-way distinction matters: an absent or garbled flag in a 2xx
/// body is `Flag(false)`, a 404 is `NotFound`, and any other failure is a
/// `CatalogError`; each gates writes differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuratedLookup {
    /// Entity exists; the flag says whether it is externally curated.
    Flag(bool),

    /// Entity does not exist in the catalog.
    NotFound,
}

/// Supplies the bearer credential for catalog calls. Token acquisition
/// and refresh are an external concern; this is only the seam.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, CatalogError>;
}

/// Fixed-token provider for tests and pre-provisioned credentials.
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, CatalogError> {
        Ok(self.0.clone())
    }
}

/// Operations the reconciliation pipeline drives against the external
/// catalog. Every method is a potential suspension point.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Idempotent create-or-update keyed by FQN.
    async fn upsert_database(&self, dto: &DatabaseDto) -> Result<(), CatalogError>;

    async fn upsert_schema(&self, dto: &SchemaDto) -> Result<(), CatalogError>;

    async fn upsert_table(&self, dto: &TableDto) -> Result<(), CatalogError>;

    /// Idempotent recursive delete-by-name.
    async fn delete_entity(&self, kind: EntityKind, fqn: &str) -> Result<(), CatalogError>;

    /// Protected-entity flag lookup by table name.
    async fn curated_flag(&self, fqn: &str) -> Result<CuratedLookup, CatalogError>;

    /// Opaque catalog identity for a table, `None` when the catalog does
    /// not know the name.
    async fn resolve_table_id(&self, fqn: &str) -> Result<Option<String>, CatalogError>;

    /// Push one lineage edge.
    async fn push_lineage(&self, request: &LineageRequest) -> Result<(), CatalogError>;
}
