//! View lineage extraction and push
//!
//! Runs after the table put stage for every view created or updated this
//! cycle: parse the definition, resolve references against the runtime
//! table cache, translate the cached FQNs into catalog ids, and push one
//! edge per resolved upstream table.
//!
//! Degradation is deliberate: an unparseable definition or a view the
//! catalog does not know yields zero edges for that view; an upstream the
//! catalog does not know drops only that edge.

use metasync_catalog::{
    CatalogClient, CatalogError, ColumnsLineage, EntityReference, LineageDetails, LineageEdge,
    LineageRequest, LineageSource,
};
use metasync_core::TableRecord;
use metasync_sql::{parse_view_sql, resolve_view_lineage, TableLookup};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Edge-level outcome of one view's lineage push.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineagePush {
    pub edges_pushed: usize,
    pub edges_failed: usize,
}

/// Push lineage edges for one view.
///
/// Edge failures are isolated: a failed id lookup or push for one upstream
/// is counted and the remaining edges still go out. Only a failed lookup
/// of the view's own catalog identity aborts the view.
///
/// `id_cache` memoizes catalog id resolution across the views of one sync
/// cycle; shared upstream tables are resolved once.
pub(crate) async fn push_view_lineage(
    catalog: &dyn CatalogClient,
    view: &TableRecord,
    lookup: &dyn TableLookup,
    fallback_schemas: &[String],
    id_cache: &mut HashMap<String, Option<String>>,
) -> Result<LineagePush, CatalogError> {
    let Some(sql) = view.view_sql() else {
        return Ok(LineagePush::default());
    };

    let parsed = match parse_view_sql(sql) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(view = %view.fqn, error = %e, "unparseable view definition, skipping lineage");
            return Ok(LineagePush::default());
        }
    };
    if parsed.upstream_tables.is_empty() {
        return Ok(LineagePush::default());
    }

    let resolved = resolve_view_lineage(view, &parsed, sql, lookup, fallback_schemas);
    if resolved.upstreams.is_empty() {
        return Ok(LineagePush::default());
    }

    let Some(view_id) = table_id(catalog, &view.fqn, id_cache).await? else {
        warn!(view = %view.fqn, "view not known to the catalog, skipping lineage");
        return Ok(LineagePush::default());
    };

    let mut push = LineagePush::default();
    for upstream in &resolved.upstreams {
        let upstream_id = match table_id(catalog, &upstream.table_fqn, id_cache).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(
                    view = %view.fqn,
                    upstream = %upstream.table_fqn,
                    "upstream not known to the catalog, dropping edge"
                );
                continue;
            }
            Err(e) => {
                warn!(
                    view = %view.fqn,
                    upstream = %upstream.table_fqn,
                    error = %e,
                    "upstream id lookup failed, dropping edge"
                );
                push.edges_failed += 1;
                continue;
            }
        };

        let columns_lineage = if upstream.columns.is_empty() {
            None
        } else {
            Some(
                upstream
                    .columns
                    .iter()
                    .map(|column| ColumnsLineage {
                        from_columns: column.from_columns.clone(),
                        to_column: column.to_column.clone(),
                    })
                    .collect(),
            )
        };

        let request = LineageRequest {
            edge: LineageEdge {
                from_entity: EntityReference::table(upstream_id),
                to_entity: EntityReference::table(view_id.clone()),
                lineage_details: LineageDetails {
                    columns_lineage,
                    sql_query: resolved.sql.clone(),
                    source: LineageSource::ViewLineage,
                },
            },
        };
        match catalog.push_lineage(&request).await {
            Ok(()) => push.edges_pushed += 1,
            Err(e) => {
                warn!(
                    view = %view.fqn,
                    upstream = %upstream.table_fqn,
                    error = %e,
                    "lineage edge push failed"
                );
                push.edges_failed += 1;
            }
        }
    }
    Ok(push)
}

async fn table_id(
    catalog: &dyn CatalogClient,
    fqn: &str,
    cache: &mut HashMap<String, Option<String>>,
) -> Result<Option<String>, CatalogError> {
    if let Some(cached) = cache.get(fqn) {
        return Ok(cached.clone());
    }
    let id = catalog.resolve_table_id(fqn).await?;
    cache.insert(fqn.to_string(), id.clone());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasync_catalog::{CatalogCall, MockCatalog};
    use metasync_core::{ColumnInfo, EntityId, TablePayload};
    use pretty_assertions::assert_eq;

    fn table(schema: &str, name: &str, kind: &str, sql: Option<&str>, columns: &[&str]) -> TableRecord {
        TableRecord {
            id: EntityId::new(1, format!("svc.db.{schema}")),
            fqn: format!("svc.db.{schema}.{name}"),
            name: name.into(),
            db_name: "db".into(),
            schema_name: schema.into(),
            service_name: "svc".into(),
            description: None,
            hash_data: Some("h".into()),
            payload: TablePayload {
                table_type: Some(kind.into()),
                view_definition: sql.map(str::to_string),
                columns: columns
                    .iter()
                    .map(|c| ColumnInfo {
                        name: (*c).into(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
        }
    }

    fn lookup_over(tables: Vec<TableRecord>) -> impl Fn(&str) -> Option<TableRecord> {
        let map: HashMap<String, TableRecord> =
            tables.into_iter().map(|t| (t.fqn.clone(), t)).collect();
        move |fqn: &str| map.get(fqn).cloned()
    }

    fn fallbacks() -> Vec<String> {
        vec!["pg_catalog".into(), "information_schema".into()]
    }

    #[tokio::test]
    async fn pushes_one_edge_per_upstream() {
        let catalog = MockCatalog::new();
        catalog.set_table_id("svc.db.public.v_orders", "id-view").await;
        catalog.set_table_id("svc.db.public.orders", "id-orders").await;

        let view = table(
            "public",
            "v_orders",
            "VIEW",
            Some("SELECT o.id AS order_id, o.total FROM orders o"),
            &["order_id", "total"],
        );
        let lookup = lookup_over(vec![table("public", "orders", "REGULAR", None, &["id", "total"])]);

        let mut cache = HashMap::new();
        let push = push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
            .await
            .unwrap();

        assert_eq!(push.edges_pushed, 1);
        assert!(catalog.calls().await.contains(&CatalogCall::PushLineage {
            from_id: "id-orders".into(),
            to_id: "id-view".into(),
        }));
    }

    #[tokio::test]
    async fn unparseable_definition_yields_zero_edges() {
        let catalog = MockCatalog::new();
        let view = table("public", "v", "VIEW", Some("SELECT FROM WHERE"), &["x"]);
        let lookup = lookup_over(vec![]);

        let mut cache = HashMap::new();
        let push = push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
            .await
            .unwrap();

        assert_eq!(push, LineagePush::default());
        assert!(catalog.calls().await.is_empty());
    }

    #[tokio::test]
    async fn view_unknown_to_catalog_yields_zero_edges() {
        let catalog = MockCatalog::new();
        // upstream has an id, the view does not
        catalog.set_table_id("svc.db.public.orders", "id-orders").await;

        let view = table(
            "public",
            "v_orders",
            "VIEW",
            Some("SELECT o.id FROM orders o"),
            &["id"],
        );
        let lookup = lookup_over(vec![table("public", "orders", "REGULAR", None, &["id"])]);

        let mut cache = HashMap::new();
        let push = push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
            .await
            .unwrap();

        assert_eq!(push.edges_pushed, 0);
        assert!(!catalog
            .calls()
            .await
            .iter()
            .any(|call| matches!(call, CatalogCall::PushLineage { .. })));
    }

    #[tokio::test]
    async fn unknown_upstream_drops_only_that_edge() {
        let catalog = MockCatalog::new();
        catalog.set_table_id("svc.db.public.v_wide", "id-view").await;
        catalog.set_table_id("svc.db.public.orders", "id-orders").await;
        // customers has no catalog id

        let view = table(
            "public",
            "v_wide",
            "VIEW",
            Some("SELECT o.total AS t, c.name AS n FROM orders o JOIN customers c ON o.cid = c.id"),
            &["t", "n"],
        );
        let lookup = lookup_over(vec![
            table("public", "orders", "REGULAR", None, &["total", "cid"]),
            table("public", "customers", "REGULAR", None, &["id", "name"]),
        ]);

        let mut cache = HashMap::new();
        let push = push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
            .await
            .unwrap();

        assert_eq!(push.edges_pushed, 1);
        assert_eq!(push.edges_failed, 0);
    }

    #[tokio::test]
    async fn edge_failure_does_not_drop_sibling_edges() {
        let catalog = MockCatalog::new();
        catalog.set_table_id("svc.db.public.v_wide", "id-view").await;
        catalog.set_table_id("svc.db.public.orders", "id-orders").await;
        catalog.set_table_id("svc.db.public.customers", "id-customers").await;
        catalog.fail_lineage_from("id-orders").await;

        let view = table(
            "public",
            "v_wide",
            "VIEW",
            Some("SELECT o.total AS t, c.name AS n FROM orders o JOIN customers c ON o.cid = c.id"),
            &["t", "n"],
        );
        let lookup = lookup_over(vec![
            table("public", "orders", "REGULAR", None, &["total", "cid"]),
            table("public", "customers", "REGULAR", None, &["id", "name"]),
        ]);

        let mut cache = HashMap::new();
        let push = push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
            .await
            .unwrap();

        assert_eq!(push.edges_pushed, 1);
        assert_eq!(push.edges_failed, 1);
        assert!(catalog.calls().await.contains(&CatalogCall::PushLineage {
            from_id: "id-customers".into(),
            to_id: "id-view".into(),
        }));
    }

    #[tokio::test]
    async fn id_resolution_is_memoized() {
        let catalog = MockCatalog::new();
        catalog.set_table_id("svc.db.public.v_a", "id-a").await;
        catalog.set_table_id("svc.db.public.v_b", "id-b").await;
        catalog.set_table_id("svc.db.public.orders", "id-orders").await;

        let orders = table("public", "orders", "REGULAR", None, &["id"]);
        let lookup = lookup_over(vec![orders]);
        let mut cache = HashMap::new();

        for name in ["v_a", "v_b"] {
            let view = table(
                "public",
                name,
                "VIEW",
                Some("SELECT o.id FROM orders o"),
                &["id"],
            );
            push_view_lineage(&catalog, &view, &lookup, &fallbacks(), &mut cache)
                .await
                .unwrap();
        }

        let resolutions = catalog
            .calls()
            .await
            .iter()
            .filter(|call| *call == &CatalogCall::ResolveTableId("svc.db.public.orders".into()))
            .count();
        assert_eq!(resolutions, 1);
    }
}
