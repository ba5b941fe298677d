//! Metadata record types
//!
//! Records mirror what the source scanner persists: one row per database,
//! schema or table, each carrying a fully-qualified name and a content
//! digest computed by the scanner. The cache layer never recomputes the
//! digest; equal `hash_data` means "identical for reconciliation".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of a metadata record.
///
/// The numeric surrogate id is only unique within its parent: two records
/// with the same id under different parents are distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub id: i64,

    /// Fully-qualified name of the owning entity.
    pub parent_fqn: String,
}

impl EntityId {
    pub fn new(id: i64, parent_fqn: impl Into<String>) -> Self {
        Self {
            id,
            parent_fqn: parent_fqn.into(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.parent_fqn, self.id)
    }
}

/// The (source-schema-kind, service-name) pair that keys one runtime cache
/// and one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub schema_name: String,
    pub service_name: String,
}

impl Scope {
    pub fn new(schema_name: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            service_name: service_name.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.schema_name, self.service_name)
    }
}

/// Common capability surface of the three metadata record kinds.
pub trait Record: Clone + Send + Sync + 'static {
    fn entity_id(&self) -> &EntityId;
    fn fqn(&self) -> &str;
    fn name(&self) -> &str;
    fn service_name(&self) -> &str;

    /// Content digest of the record's significant fields, as computed by
    /// the source scanner. `None` when the scanner did not provide one.
    fn hash_data(&self) -> Option<&str>;

    fn parent_fqn(&self) -> &str {
        &self.entity_id().parent_fqn
    }
}

/// A source database observed by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub id: EntityId,
    pub fqn: String,
    pub name: String,
    pub service_name: String,
    pub hash_data: Option<String>,
}

impl Record for DatabaseRecord {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
    fn fqn(&self) -> &str {
        &self.fqn
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn service_name(&self) -> &str {
        &self.service_name
    }
    fn hash_data(&self) -> Option<&str> {
        self.hash_data.as_deref()
    }
}

/// A schema within a source database. The parent FQN is the owning
/// database's FQN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    pub id: EntityId,
    pub fqn: String,
    pub name: String,
    pub service_name: String,
    pub hash_data: Option<String>,
}

impl Record for SchemaRecord {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
    fn fqn(&self) -> &str {
        &self.fqn
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn service_name(&self) -> &str {
        &self.service_name
    }
    fn hash_data(&self) -> Option<&str> {
        self.hash_data.as_deref()
    }
}

/// A table (or view) within a source schema, with its semi-structured
/// payload document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: EntityId,
    pub fqn: String,
    pub name: String,
    pub db_name: String,
    pub schema_name: String,
    pub service_name: String,
    pub description: Option<String>,
    pub hash_data: Option<String>,
    pub payload: TablePayload,
}

impl TableRecord {
    /// Table kind parsed from the payload. Unrecognized kinds map to `None`.
    pub fn kind(&self) -> Option<TableKind> {
        self.payload
            .table_type
            .as_deref()
            .and_then(TableKind::from_source)
    }

    /// True for every view flavor the catalog distinguishes.
    pub fn is_view(&self) -> bool {
        self.kind().map(|k| k.is_view()).unwrap_or(false)
    }

    /// The view's SQL definition, when present and non-blank.
    pub fn view_sql(&self) -> Option<&str> {
        self.payload
            .view_definition
            .as_deref()
            .filter(|sql| !sql.trim().is_empty())
    }
}

impl Record for TableRecord {
    fn entity_id(&self) -> &EntityId {
        &self.id
    }
    fn fqn(&self) -> &str {
        &self.fqn
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn service_name(&self) -> &str {
        &self.service_name
    }
    fn hash_data(&self) -> Option<&str> {
        self.hash_data.as_deref()
    }
}

/// Semi-structured table payload as persisted by the scanner.
///
/// Fields the sync pipeline does not model are preserved in `extra` so a
/// round-trip through the store loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    #[serde(default)]
    pub table_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_definition: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnInfo>,

    #[serde(default)]
    pub table_constraints: Vec<TableConstraint>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One column of a table payload, in source ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,

    #[serde(default)]
    pub data_type: Option<String>,

    #[serde(default)]
    pub data_type_display: Option<String>,

    #[serde(default)]
    pub data_length: Option<String>,

    #[serde(default)]
    pub ordinal_position: Option<i32>,

    /// Column constraint marker from the scanner (`NULLABLE`, `NOT_NULL`,
    /// `PRIMARY_KEY`, ...).
    #[serde(default)]
    pub constraint: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Table-level constraint from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConstraint {
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub constraint_type: Option<String>,
}

impl TableConstraint {
    /// Constraint kinds the catalog does not understand are dropped before
    /// export.
    pub fn is_supported(&self) -> bool {
        ConstraintKind::parse(self.constraint_type.as_deref()) != ConstraintKind::Unknown
    }
}

/// Table-level constraint kinds the external catalog accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    PrimaryKey,
    ForeignKey,
    SortKey,
    DistKey,
    Unknown,
}

impl ConstraintKind {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("UNIQUE") => Self::Unique,
            Some("PRIMARY_KEY") => Self::PrimaryKey,
            Some("FOREIGN_KEY") => Self::ForeignKey,
            Some("SORT_KEY") => Self::SortKey,
            Some("DIST_KEY") => Self::DistKey,
            _ => Self::Unknown,
        }
    }
}

/// Table kinds, with the casing the external catalog expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Regular,
    External,
    View,
    SecureView,
    MaterializedView,
    Iceberg,
    Local,
}

impl TableKind {
    /// Parse the scanner's upper-case kind name.
    pub fn from_source(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "REGULAR" => Some(Self::Regular),
            "EXTERNAL" => Some(Self::External),
            "VIEW" => Some(Self::View),
            "SECUREVIEW" => Some(Self::SecureView),
            "MATERIALIZED_VIEW" | "MATERIALIZEDVIEW" => Some(Self::MaterializedView),
            "ICEBERG" => Some(Self::Iceberg),
            "LOCAL" => Some(Self::Local),
            _ => None,
        }
    }

    /// Kind name in the catalog's casing.
    pub fn catalog_name(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::External => "External",
            Self::View => "View",
            Self::SecureView => "SecureView",
            Self::MaterializedView => "MaterializedView",
            Self::Iceberg => "Iceberg",
            Self::Local => "Local",
        }
    }

    pub fn is_view(self) -> bool {
        matches!(self, Self::View | Self::SecureView | Self::MaterializedView)
    }
}
