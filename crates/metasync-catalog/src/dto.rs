//! Catalog wire representations
//!
//! The catalog speaks camelCase JSON; optional lineage fields are omitted
//! rather than sent as null.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseDto {
    pub name: String,
    pub display_name: String,
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDto {
    pub name: String,
    pub display_name: String,

    /// FQN of the owning database.
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDto {
    pub name: String,
    pub display_name: String,

    /// FQN of the owning schema.
    pub database_schema: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub table_type: String,

    /// Ingested entities are never catalog-curated.
    pub is_project_entity: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_definition: Option<String>,

    pub columns: Vec<ColumnDto>,

    pub table_constraints: Vec<ConstraintDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDto {
    pub name: String,

    pub data_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_data_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_display: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_length: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordinal_position: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDto {
    pub columns: Vec<String>,
    pub constraint_type: String,
}

/// Body of `PUT <lineage-endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRequest {
    pub edge: LineageEdge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    pub from_entity: EntityReference,
    pub to_entity: EntityReference,
    pub lineage_details: LineageDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReference {
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Opaque catalog identity.
    pub id: String,
}

impl EntityReference {
    pub fn table(id: impl Into<String>) -> Self {
        Self {
            entity_type: "table".to_string(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns_lineage: Option<Vec<ColumnsLineage>>,

    pub sql_query: String,

    pub source: LineageSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnsLineage {
    pub from_columns: Vec<String>,
    pub to_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineageSource {
    ViewLineage,
}
