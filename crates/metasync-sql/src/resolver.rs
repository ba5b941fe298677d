//! Lineage resolution against cached table metadata
//!
//! Turns a parsed view definition into fully-qualified column lineage.
//! Resolution is pure: the caller supplies a `TableLookup` over the
//! runtime table cache for the current (schema, service) scope, and gets
//! back one upstream entry per distinct resolved table. Catalog identity
//! resolution happens later, in the engine.

use crate::parser::{norm_ident, norm_key, ColumnRef, ParsedLineage, TableRef};
use metasync_core::TableRecord;
use std::collections::HashMap;
use tracing::debug;

/// Lookup into the cached table metadata for the scope being synced.
pub trait TableLookup {
    fn find_table(&self, fqn: &str) -> Option<TableRecord>;
}

impl<F> TableLookup for F
where
    F: Fn(&str) -> Option<TableRecord>,
{
    fn find_table(&self, fqn: &str) -> Option<TableRecord> {
        self(fqn)
    }
}

/// One target column FQN and the deduplicated source column FQNs feeding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLineage {
    pub to_column: String,
    pub from_columns: Vec<String>,
}

/// Column lineage restricted to one resolved upstream table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamLineage {
    pub table_fqn: String,
    pub columns: Vec<ColumnLineage>,
}

/// Fully resolved lineage for one view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedViewLineage {
    pub view_fqn: String,
    pub sql: String,
    pub upstreams: Vec<UpstreamLineage>,
}

/// Resolve a parsed view definition into column lineage.
///
/// Upstream references resolve by trying, in order: the explicit schema
/// from the SQL, the view's own schema, then each fallback system schema.
/// A candidate counts only if the cached metadata actually holds a table
/// with that FQN; unresolvable upstreams are dropped.
pub fn resolve_view_lineage(
    view: &TableRecord,
    parsed: &ParsedLineage,
    sql: &str,
    lookup: &dyn TableLookup,
    fallback_schemas: &[String],
) -> ResolvedViewLineage {
    let view_fqn = view.fqn.clone();
    let view_columns = column_index(Some(view));

    // alias (lower) -> resolved upstream FQN, plus each resolved table's
    // column index
    let mut alias_to_fqn: HashMap<String, String> = HashMap::new();
    let mut upstream_columns: HashMap<String, HashMap<String, String>> = HashMap::new();

    for (alias, table_ref) in &parsed.alias_to_table {
        let Some(upstream_fqn) = resolve_upstream_fqn(view, table_ref, lookup, fallback_schemas)
        else {
            debug!(view = %view_fqn, table = %table_ref.name, "upstream table not in cached metadata");
            continue;
        };

        let upstream = lookup.find_table(&upstream_fqn);
        upstream_columns
            .entry(upstream_fqn.clone())
            .or_insert_with(|| column_index(upstream.as_ref()));
        alias_to_fqn.insert(alias.clone(), upstream_fqn);
    }

    let column_lineage = build_column_lineage(
        view,
        &view_fqn,
        &view_columns,
        parsed,
        &alias_to_fqn,
        &upstream_columns,
        lookup,
        fallback_schemas,
    );

    // One upstream entry per distinct resolved table, with the column
    // detail filtered down to sources belonging to that table.
    let mut upstreams: Vec<UpstreamLineage> = Vec::new();
    for table_ref in &parsed.upstream_tables {
        let Some(upstream_fqn) = resolve_upstream_fqn(view, table_ref, lookup, fallback_schemas)
        else {
            continue;
        };
        if upstreams.iter().any(|u| u.table_fqn == upstream_fqn) {
            continue;
        }

        let prefix = format!("{upstream_fqn}.");
        let columns = column_lineage
            .iter()
            .filter_map(|cl| {
                let from: Vec<String> = cl
                    .from_columns
                    .iter()
                    .filter(|fqn| fqn.starts_with(&prefix))
                    .cloned()
                    .collect();
                if from.is_empty() {
                    None
                } else {
                    Some(ColumnLineage {
                        to_column: cl.to_column.clone(),
                        from_columns: from,
                    })
                }
            })
            .collect();

        upstreams.push(UpstreamLineage {
            table_fqn: upstream_fqn,
            columns,
        });
    }

    ResolvedViewLineage {
        view_fqn,
        sql: sql.to_string(),
        upstreams,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_column_lineage(
    view: &TableRecord,
    view_fqn: &str,
    view_columns: &HashMap<String, String>,
    parsed: &ParsedLineage,
    alias_to_fqn: &HashMap<String, String>,
    upstream_columns: &HashMap<String, HashMap<String, String>>,
    lookup: &dyn TableLookup,
    fallback_schemas: &[String],
) -> Vec<ColumnLineage> {
    let mut out = Vec::new();

    for mapping in &parsed.column_mappings {
        let to_name = norm_ident(&mapping.to_column);
        if to_name.is_empty() {
            continue;
        }
        let to_fqn = view_columns
            .get(&to_name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| format!("{view_fqn}.{to_name}"));

        let mut from_fqns: Vec<String> = Vec::new();

        for column_ref in &mapping.from {
            let Some(upstream_fqn) =
                resolve_source_table(view, column_ref, parsed, alias_to_fqn, lookup, fallback_schemas)
            else {
                continue;
            };

            let column = norm_ident(&column_ref.column);
            if column.is_empty() {
                continue;
            }

            let from_fqn = upstream_columns
                .get(&upstream_fqn)
                .and_then(|index| index.get(&column.to_lowercase()))
                .cloned()
                .unwrap_or_else(|| format!("{upstream_fqn}.{column}"));

            if !from_fqns.contains(&from_fqn) {
                from_fqns.push(from_fqn);
            }
        }

        if !from_fqns.is_empty() {
            out.push(ColumnLineage {
                to_column: to_fqn,
                from_columns: from_fqns,
            });
        }
    }

    out
}

/// Which upstream table a source column reference belongs to.
fn resolve_source_table(
    view: &TableRecord,
    column_ref: &ColumnRef,
    parsed: &ParsedLineage,
    alias_to_fqn: &HashMap<String, String>,
    lookup: &dyn TableLookup,
    fallback_schemas: &[String],
) -> Option<String> {
    match column_ref.qualifier.as_deref() {
        Some(qualifier) => {
            let key = norm_key(qualifier);
            if let Some(fqn) = alias_to_fqn.get(&key) {
                return Some(fqn.clone());
            }
            // Not a known alias: treat the qualifier as a bare table name.
            let table_ref = TableRef {
                schema: None,
                name: qualifier.to_string(),
            };
            resolve_upstream_fqn(view, &table_ref, lookup, fallback_schemas)
        }
        None => {
            // No qualifier. With exactly one upstream table the reference
            // can only come from there; the column itself is not validated
            // against that table (known heuristic).
            if parsed.upstream_tables.len() == 1 {
                resolve_upstream_fqn(view, &parsed.upstream_tables[0], lookup, fallback_schemas)
            } else {
                None
            }
        }
    }
}

/// Resolve a table reference to a cached FQN, trying the explicit schema,
/// then the view's own schema, then the fallback system schemas.
fn resolve_upstream_fqn(
    view: &TableRecord,
    table_ref: &TableRef,
    lookup: &dyn TableLookup,
    fallback_schemas: &[String],
) -> Option<String> {
    let table_name = norm_ident(&table_ref.name);
    if table_name.is_empty() {
        return None;
    }

    if let Some(schema) = table_ref.schema.as_deref() {
        let schema = norm_ident(schema);
        if !schema.is_empty() {
            let fqn = format!(
                "{}.{}.{}.{}",
                view.service_name, view.db_name, schema, table_name
            );
            return lookup.find_table(&fqn).map(|t| t.fqn);
        }
    }

    let mut candidates = Vec::with_capacity(1 + fallback_schemas.len());
    candidates.push(view.schema_name.clone());
    candidates.extend(fallback_schemas.iter().cloned());

    for candidate in candidates {
        let schema = norm_ident(&candidate);
        if schema.is_empty() {
            continue;
        }
        let fqn = format!(
            "{}.{}.{}.{}",
            view.service_name, view.db_name, schema, table_name
        );
        if let Some(table) = lookup.find_table(&fqn) {
            return Some(table.fqn);
        }
    }

    None
}

/// Column name (lower) → column FQN index for a cached table.
fn column_index(table: Option<&TableRecord>) -> HashMap<String, String> {
    let Some(table) = table else {
        return HashMap::new();
    };

    let mut index = HashMap::new();
    for column in &table.payload.columns {
        let name = norm_ident(&column.name);
        if !name.is_empty() {
            index.insert(name.to_lowercase(), format!("{}.{}", table.fqn, name));
        }
    }
    index
}
