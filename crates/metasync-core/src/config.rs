//! Sync configuration (metasync.toml)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Source system kind a sync scope targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Postgres,
    Mssql,
    Oracle,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mssql => "mssql",
            Self::Oracle => "oracle",
        }
    }
}

/// Maps source-schema names (as used in scope keys) to source kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaKindMap {
    #[serde(default = "default_postgres_schema")]
    pub postgres: String,

    #[serde(default = "default_mssql_schema")]
    pub mssql: String,

    #[serde(default = "default_oracle_schema")]
    pub oracle: String,
}

impl Default for SchemaKindMap {
    fn default() -> Self {
        Self {
            postgres: default_postgres_schema(),
            mssql: default_mssql_schema(),
            oracle: default_oracle_schema(),
        }
    }
}

impl SchemaKindMap {
    /// Resolve a schema name to its source kind. Unknown names are a
    /// configuration error the caller must surface before any cache work.
    pub fn resolve(&self, schema_name: &str) -> Option<SourceKind> {
        if schema_name == self.postgres {
            Some(SourceKind::Postgres)
        } else if schema_name == self.mssql {
            Some(SourceKind::Mssql)
        } else if schema_name == self.oracle {
            Some(SourceKind::Oracle)
        } else {
            None
        }
    }
}

fn default_postgres_schema() -> String {
    "postgres_metadata".to_string()
}

fn default_mssql_schema() -> String {
    "mssql_metadata".to_string()
}

fn default_oracle_schema() -> String {
    "oracle_metadata".to_string()
}

/// External catalog endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEndpoints {
    pub base_url: String,

    #[serde(default = "default_database_endpoint")]
    pub database: String,

    #[serde(default = "default_schema_endpoint")]
    pub schema: String,

    #[serde(default = "default_table_endpoint")]
    pub table: String,

    #[serde(default = "default_lineage_endpoint")]
    pub lineage: String,
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8585/api".to_string(),
            database: default_database_endpoint(),
            schema: default_schema_endpoint(),
            table: default_table_endpoint(),
            lineage: default_lineage_endpoint(),
        }
    }
}

fn default_database_endpoint() -> String {
    "/v1/databases".to_string()
}

fn default_schema_endpoint() -> String {
    "/v1/databaseSchemas".to_string()
}

fn default_table_endpoint() -> String {
    "/v1/tables".to_string()
}

fn default_lineage_endpoint() -> String {
    "/v1/lineage".to_string()
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub endpoints: CatalogEndpoints,

    #[serde(default)]
    pub schemas: SchemaKindMap,

    /// Maximum simultaneous in-flight catalog calls per batch.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// System schemas tried when a view references a table without an
    /// explicit schema and it is not in the view's own schema.
    #[serde(default = "default_fallback_schemas")]
    pub fallback_schemas: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoints: CatalogEndpoints::default(),
            schemas: SchemaKindMap::default(),
            max_in_flight: default_max_in_flight(),
            fallback_schemas: default_fallback_schemas(),
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

fn default_max_in_flight() -> usize {
    5
}

fn default_fallback_schemas() -> Vec<String> {
    vec!["pg_catalog".to_string(), "information_schema".to_string()]
}
