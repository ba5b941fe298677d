//! Record → wire DTO mapping
//!
//! Normalizes source metadata into what the catalog accepts: table kinds
//! in the catalog's casing, source column types mapped to the catalog's
//! type vocabulary, data length only for length-bearing types, and
//! unsupported table constraints dropped.

use crate::dto::{ColumnDto, ConstraintDto, DatabaseDto, SchemaDto, TableDto};
use metasync_core::{ColumnInfo, DatabaseRecord, Record, SchemaRecord, SourceKind, TableKind, TableRecord};
use tracing::debug;

pub fn database_dto(record: &DatabaseRecord) -> DatabaseDto {
    DatabaseDto {
        name: record.name.clone(),
        display_name: record.name.clone(),
        service: record.service_name.clone(),
    }
}

pub fn schema_dto(record: &SchemaRecord) -> SchemaDto {
    SchemaDto {
        name: record.name.clone(),
        display_name: record.name.clone(),
        database: record.parent_fqn().to_string(),
    }
}

pub fn table_dto(record: &TableRecord, kind: SourceKind) -> TableDto {
    let table_type = record
        .payload
        .table_type
        .as_deref()
        .map(|raw| {
            if raw.is_empty() {
                raw.to_string()
            } else {
                TableKind::from_source(raw)
                    .map(|k| k.catalog_name().to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string())
            }
        })
        .unwrap_or_default();

    let columns = record
        .payload
        .columns
        .iter()
        .map(|column| column_dto(column, kind))
        .collect();

    let table_constraints = record
        .payload
        .table_constraints
        .iter()
        .filter(|constraint| {
            let keep = constraint.is_supported();
            if !keep {
                debug!(
                    table = %record.fqn,
                    constraint = constraint.constraint_type.as_deref().unwrap_or(""),
                    "dropping constraint the catalog does not support"
                );
            }
            keep
        })
        .map(|constraint| ConstraintDto {
            columns: constraint.columns.clone(),
            constraint_type: constraint
                .constraint_type
                .clone()
                .unwrap_or_default(),
        })
        .collect();

    TableDto {
        name: record.name.clone(),
        display_name: record.name.clone(),
        database_schema: record.parent_fqn().to_string(),
        description: record.description.clone(),
        table_type,
        is_project_entity: false,
        view_definition: record.payload.view_definition.clone(),
        columns,
        table_constraints,
    }
}

fn column_dto(column: &ColumnInfo, kind: SourceKind) -> ColumnDto {
    let source_type = column.data_type.as_deref().unwrap_or("");
    let data_type = map_data_type(kind, source_type);
    let array_data_type = array_element_type(source_type, &data_type);
    let data_length = processed_data_length(&data_type, column.data_length.clone());

    // NULLABLE is the scanner's "no constraint" marker, not a constraint.
    let constraint = column
        .constraint
        .clone()
        .filter(|c| !c.eq_ignore_ascii_case("NULLABLE"));

    ColumnDto {
        name: column.name.clone(),
        data_type,
        array_data_type,
        data_type_display: column.data_type_display.clone(),
        data_length,
        description: column.description.clone(),
        constraint,
        ordinal_position: column.ordinal_position,
    }
}

/// Map a source column type to the catalog's type vocabulary.
fn map_data_type(kind: SourceKind, raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "UNKNOWN".to_string();
    }
    if trimmed.ends_with("[]") {
        return "ARRAY".to_string();
    }

    let upper = trimmed.to_ascii_uppercase();
    let mapped = match kind {
        SourceKind::Postgres => match upper.as_str() {
            "INT2" | "SMALLINT" => Some("SMALLINT"),
            "INT4" | "INTEGER" | "SERIAL" => Some("INT"),
            "INT8" | "BIGINT" | "BIGSERIAL" => Some("BIGINT"),
            "NUMERIC" | "DECIMAL" => Some("NUMERIC"),
            "FLOAT4" | "REAL" => Some("FLOAT"),
            "FLOAT8" | "DOUBLE PRECISION" => Some("DOUBLE"),
            "BOOL" | "BOOLEAN" => Some("BOOLEAN"),
            "BPCHAR" | "CHARACTER" | "CHAR" => Some("CHAR"),
            "VARCHAR" | "CHARACTER VARYING" => Some("VARCHAR"),
            "TEXT" | "NAME" => Some("TEXT"),
            "BYTEA" => Some("BINARY"),
            "DATE" => Some("DATE"),
            "TIME" | "TIMETZ" => Some("TIME"),
            "TIMESTAMP" => Some("TIMESTAMP"),
            "TIMESTAMPTZ" => Some("TIMESTAMPZ"),
            "UUID" => Some("UUID"),
            "JSON" | "JSONB" => Some("JSON"),
            "XML" => Some("XML"),
            "INTERVAL" => Some("INTERVAL"),
            _ => None,
        },
        SourceKind::Mssql => match upper.as_str() {
            "BIGINT" => Some("BIGINT"),
            "INT" => Some("INT"),
            "SMALLINT" => Some("SMALLINT"),
            "TINYINT" => Some("TINYINT"),
            "BIT" => Some("BOOLEAN"),
            "DECIMAL" => Some("DECIMAL"),
            "NUMERIC" => Some("NUMERIC"),
            "MONEY" | "SMALLMONEY" => Some("NUMBER"),
            "FLOAT" | "REAL" => Some("FLOAT"),
            "DATE" => Some("DATE"),
            "TIME" => Some("TIME"),
            "DATETIME" | "DATETIME2" | "DATETIMEOFFSET" | "SMALLDATETIME" => Some("DATETIME"),
            "CHAR" | "NCHAR" => Some("CHAR"),
            "VARCHAR" | "NVARCHAR" => Some("VARCHAR"),
            "TEXT" | "NTEXT" => Some("TEXT"),
            "BINARY" => Some("BINARY"),
            "VARBINARY" | "SQL_VARIANT" => Some("VARBINARY"),
            "IMAGE" => Some("BLOB"),
            "UNIQUEIDENTIFIER" => Some("UUID"),
            "XML" => Some("XML"),
            "GEOGRAPHY" => Some("GEOGRAPHY"),
            "GEOMETRY" => Some("GEOMETRY"),
            _ => None,
        },
        SourceKind::Oracle => match upper.as_str() {
            "NUMBER" => Some("NUMERIC"),
            "BINARY_FLOAT" => Some("FLOAT"),
            "BINARY_DOUBLE" => Some("DOUBLE"),
            "CHAR" | "NCHAR" => Some("CHAR"),
            "VARCHAR2" | "NVARCHAR2" | "VARCHAR" => Some("VARCHAR"),
            "LONG" => Some("TEXT"),
            "RAW" | "LONG RAW" => Some("BINARY"),
            "DATE" => Some("DATETIME"),
            "TIMESTAMP" => Some("TIMESTAMP"),
            "CLOB" | "NCLOB" => Some("CLOB"),
            "BLOB" | "BFILE" => Some("BLOB"),
            "XMLTYPE" => Some("XML"),
            _ => None,
        },
    };

    mapped.map(str::to_string).unwrap_or_else(|| "UNKNOWN".to_string())
}

/// Element type for `T[]` source types mapped to ARRAY.
fn array_element_type(source_type: &str, mapped_type: &str) -> Option<String> {
    if mapped_type != "ARRAY" {
        return None;
    }
    source_type
        .trim()
        .strip_suffix("[]")
        .map(|element| element.to_ascii_uppercase())
}

/// Length-bearing catalog types must always carry a data length; other
/// types pass the source value through untouched.
fn processed_data_length(data_type: &str, data_length: Option<String>) -> Option<String> {
    const LENGTH_BEARING: [&str; 4] = ["VARCHAR", "CHAR", "BINARY", "VARBINARY"];

    if LENGTH_BEARING.contains(&data_type) {
        Some(data_length.unwrap_or_else(|| "0".to_string()))
    } else {
        data_length
    }
}
