//! End-to-end reconciliation cycles against an in-memory source and a
//! mock catalog.

use async_trait::async_trait;
use metasync_cache::{MetadataSource, SourceError};
use metasync_catalog::{CatalogCall, CuratedLookup, EntityKind, MockCatalog};
use metasync_core::{
    ColumnInfo, DatabaseRecord, EntityId, SchemaRecord, Scope, SyncConfig, TablePayload,
    TableRecord,
};
use metasync_engine::{Reconciler, SyncError};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct SourceState {
    databases: Vec<DatabaseRecord>,
    schemas: Vec<SchemaRecord>,
    tables: Vec<TableRecord>,
    fail_reads: bool,
}

/// In-memory stand-in for the relational metadata store.
#[derive(Default)]
struct MemorySource {
    state: Mutex<SourceState>,
}

impl MemorySource {
    fn set_databases(&self, rows: Vec<DatabaseRecord>) {
        self.state.lock().unwrap().databases = rows;
    }
    fn set_schemas(&self, rows: Vec<SchemaRecord>) {
        self.state.lock().unwrap().schemas = rows;
    }
    fn set_tables(&self, rows: Vec<TableRecord>) {
        self.state.lock().unwrap().tables = rows;
    }
    fn clear(&self) {
        *self.state.lock().unwrap() = SourceState::default();
    }
    fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }
    fn check_read(&self) -> Result<(), SourceError> {
        if self.state.lock().unwrap().fail_reads {
            return Err(SourceError::Read("scripted read failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataSource for MemorySource {
    async fn load_databases(&self, _scope: &Scope) -> Result<Vec<DatabaseRecord>, SourceError> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().databases.clone())
    }

    async fn load_schemas(&self, _scope: &Scope) -> Result<Vec<SchemaRecord>, SourceError> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().schemas.clone())
    }

    async fn load_tables(&self, _scope: &Scope) -> Result<Vec<TableRecord>, SourceError> {
        self.check_read()?;
        Ok(self.state.lock().unwrap().tables.clone())
    }

    async fn delete_by_scope(&self, _scope: &Scope) -> Result<(), SourceError> {
        self.clear();
        Ok(())
    }
}

fn scope() -> Scope {
    Scope::new("postgres_metadata", "svc")
}

fn database() -> DatabaseRecord {
    DatabaseRecord {
        id: EntityId::new(1, "svc"),
        fqn: "svc.db".into(),
        name: "db".into(),
        service_name: "svc".into(),
        hash_data: Some("db-h1".into()),
    }
}

fn schema() -> SchemaRecord {
    SchemaRecord {
        id: EntityId::new(1, "svc.db"),
        fqn: "svc.db.public".into(),
        name: "public".into(),
        service_name: "svc".into(),
        hash_data: Some("schema-h1".into()),
    }
}

fn table(id: i64, name: &str, hash: &str, columns: &[&str]) -> TableRecord {
    TableRecord {
        id: EntityId::new(id, "svc.db.public"),
        fqn: format!("svc.db.public.{name}"),
        name: name.into(),
        db_name: "db".into(),
        schema_name: "public".into(),
        service_name: "svc".into(),
        description: None,
        hash_data: Some(hash.into()),
        payload: TablePayload {
            table_type: Some("REGULAR".into()),
            columns: columns
                .iter()
                .map(|c| ColumnInfo {
                    name: (*c).into(),
                    data_type: Some("int4".into()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        },
    }
}

fn view(id: i64, name: &str, hash: &str, sql: &str, columns: &[&str]) -> TableRecord {
    let mut record = table(id, name, hash, columns);
    record.payload.table_type = Some("VIEW".into());
    record.payload.view_definition = Some(sql.into());
    record
}

fn fixture(max_in_flight: usize) -> (Arc<MemorySource>, MockCatalog, Reconciler) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let source = Arc::new(MemorySource::default());
    let catalog = MockCatalog::new();
    let config = SyncConfig {
        max_in_flight,
        ..Default::default()
    };
    let reconciler = Reconciler::new(config, source.clone(), Arc::new(catalog.clone()));
    (source, catalog, reconciler)
}

fn position(calls: &[CatalogCall], wanted: &CatalogCall) -> usize {
    calls
        .iter()
        .position(|call| call == wanted)
        .unwrap_or_else(|| panic!("call {wanted:?} not found in {calls:?}"))
}

#[tokio::test]
async fn first_sync_pushes_parent_first() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![table(10, "orders", "t-h1", &["id"])]);

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.database_puts.completed, 1);
    assert_eq!(report.schema_puts.completed, 1);
    assert_eq!(report.table_puts.completed, 1);
    assert!(!report.has_failures());

    let calls = catalog.calls().await;
    let db_put = position(&calls, &CatalogCall::UpsertDatabase("svc.db".into()));
    let schema_put = position(&calls, &CatalogCall::UpsertSchema("svc.db.public".into()));
    let table_put = position(&calls, &CatalogCall::UpsertTable("svc.db.public.orders".into()));
    assert!(db_put < schema_put);
    assert!(schema_put < table_put);
}

#[tokio::test]
async fn unchanged_resync_pushes_nothing() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![table(10, "orders", "t-h1", &["id"])]);

    reconciler.run_sync(&scope()).await.unwrap();
    let after_first = catalog.calls().await.len();

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(catalog.calls().await.len(), after_first);
    assert_eq!(report.table_puts.attempted, 0);
    assert_eq!(report.table_deletes.attempted, 0);
}

#[tokio::test]
async fn curated_guard_gates_table_puts() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_tables(vec![
        table(1, "curated", "h1", &["id"]),
        table(2, "broken_lookup", "h2", &["id"]),
        table(3, "fresh", "h3", &["id"]),
    ]);
    catalog
        .set_curated("svc.db.public.curated", CuratedLookup::Flag(true))
        .await;
    catalog.fail_curated("svc.db.public.broken_lookup").await;

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.table_puts.skipped_curated, 1);
    assert_eq!(report.table_puts.failed, 1);
    assert_eq!(report.table_puts.completed, 1);

    let calls = catalog.calls().await;
    assert!(!calls.contains(&CatalogCall::UpsertTable("svc.db.public.curated".into())));
    assert!(!calls.contains(&CatalogCall::UpsertTable("svc.db.public.broken_lookup".into())));
    assert!(calls.contains(&CatalogCall::UpsertTable("svc.db.public.fresh".into())));
}

#[tokio::test]
async fn deletes_flow_child_first_and_respect_guard() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![
        table(1, "deletable", "h1", &["id"]),
        table(2, "protected", "h2", &["id"]),
        table(3, "vanished", "h3", &["id"]),
    ]);
    catalog
        .set_curated("svc.db.public.deletable", CuratedLookup::Flag(false))
        .await;
    catalog
        .set_curated("svc.db.public.protected", CuratedLookup::Flag(false))
        .await;
    reconciler.run_sync(&scope()).await.unwrap();

    // everything disappears from the source; protected becomes curated,
    // vanished is already gone from the catalog
    source.clear();
    catalog
        .set_curated("svc.db.public.protected", CuratedLookup::Flag(true))
        .await;
    catalog
        .set_curated("svc.db.public.vanished", CuratedLookup::NotFound)
        .await;

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.table_deletes.attempted, 3);
    assert_eq!(report.table_deletes.skipped_curated, 1);
    // deletable deleted, vanished was a no-op
    assert_eq!(report.table_deletes.completed, 2);
    assert_eq!(report.schema_deletes.completed, 1);
    assert_eq!(report.database_deletes.completed, 1);

    let calls = catalog.calls().await;
    assert!(!calls.contains(&CatalogCall::Delete(
        EntityKind::Table,
        "svc.db.public.protected".into()
    )));
    assert!(!calls.contains(&CatalogCall::Delete(
        EntityKind::Table,
        "svc.db.public.vanished".into()
    )));

    let table_delete = position(
        &calls,
        &CatalogCall::Delete(EntityKind::Table, "svc.db.public.deletable".into()),
    );
    let schema_delete = position(
        &calls,
        &CatalogCall::Delete(EntityKind::Schema, "svc.db.public".into()),
    );
    let db_delete = position(&calls, &CatalogCall::Delete(EntityKind::Database, "svc.db".into()));
    assert!(table_delete < schema_delete);
    assert!(schema_delete < db_delete);

    // runtime caches dropped the deleted entities either way
    assert!(reconciler
        .table_store()
        .find_by_fqn(&scope(), "svc.db.public.protected")
        .is_none());
}

#[tokio::test]
async fn per_table_failure_is_isolated() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_tables(vec![
        table(1, "good", "h1", &["id"]),
        table(2, "bad", "h2", &["id"]),
    ]);
    catalog.fail_writes("svc.db.public.bad").await;

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.table_puts.completed, 1);
    assert_eq!(report.table_puts.failed, 1);
    assert!(report.has_failures());

    // the runtime cache reflects the snapshot regardless of push outcome
    assert!(reconciler
        .table_store()
        .find_by_fqn(&scope(), "svc.db.public.bad")
        .is_some());
}

#[tokio::test]
async fn catalog_concurrency_is_bounded() {
    let (source, _, _) = fixture(3);
    let catalog = MockCatalog::new().with_latency(10);
    let config = SyncConfig {
        max_in_flight: 3,
        ..Default::default()
    };
    let reconciler = Reconciler::new(config, source.clone(), Arc::new(catalog.clone()));

    source.set_tables((0..12).map(|i| table(i, &format!("t{i}"), "h", &["id"])).collect());
    reconciler.run_sync(&scope()).await.unwrap();

    assert!(catalog.max_observed_in_flight() <= 3);
}

#[tokio::test]
async fn view_lineage_end_to_end() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![
        table(1, "orders", "h1", &["id", "total"]),
        view(
            2,
            "v_orders",
            "h2",
            "SELECT o.id AS order_id, o.total FROM orders o",
            &["order_id", "total"],
        ),
    ]);
    catalog.set_table_id("svc.db.public.orders", "id-orders").await;
    catalog.set_table_id("svc.db.public.v_orders", "id-view").await;

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.lineage.views, 1);
    assert_eq!(report.lineage.edges_pushed, 1);
    assert_eq!(report.lineage.failed, 0);

    assert!(catalog.calls().await.contains(&CatalogCall::PushLineage {
        from_id: "id-orders".into(),
        to_id: "id-view".into(),
    }));
}

#[tokio::test]
async fn view_over_unknown_upstream_pushes_no_edges() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_tables(vec![view(
        1,
        "v_ghost",
        "h1",
        "SELECT g.x FROM ghost g",
        &["x"],
    )]);

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.lineage.views, 1);
    assert_eq!(report.lineage.edges_pushed, 0);
    assert!(!catalog
        .calls()
        .await
        .iter()
        .any(|call| matches!(call, CatalogCall::PushLineage { .. })));
}

#[tokio::test]
async fn unknown_schema_fails_before_any_work() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_tables(vec![table(1, "orders", "h1", &["id"])]);

    let result = reconciler
        .run_sync(&Scope::new("mystery_metadata", "svc"))
        .await;
    assert!(matches!(result, Err(SyncError::UnknownSchema(_))));
    assert!(catalog.calls().await.is_empty());
}

#[tokio::test]
async fn source_failure_aborts_cycle_before_catalog() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![table(1, "orders", "h1", &["id"])]);
    source.fail_reads(true);

    let result = reconciler.run_sync(&scope()).await;
    assert!(matches!(result, Err(SyncError::Source(_))));

    // nothing reached the catalog, nothing landed in the runtime cache
    assert!(catalog.calls().await.is_empty());
    assert!(reconciler.table_store().is_empty(&scope()));

    // once the source recovers, the next cycle pushes everything
    source.fail_reads(false);
    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.table_puts.completed, 1);
}

#[tokio::test]
async fn concurrent_syncs_of_one_scope_serialize() {
    let (source, _, _) = fixture(5);
    let catalog = MockCatalog::new().with_latency(10);
    let config = SyncConfig::default();
    let reconciler = Reconciler::new(config, source.clone(), Arc::new(catalog.clone()));

    source.set_tables(vec![table(1, "orders", "h1", &["id"])]);

    // Both cycles target the same scope. Whichever loses the scope lock
    // runs second, sees an unchanged snapshot and pushes nothing.
    let (scope_a, scope_b) = (scope(), scope());
    let (a, b) = tokio::join!(reconciler.run_sync(&scope_a), reconciler.run_sync(&scope_b));
    a.unwrap();
    b.unwrap();

    let upserts = catalog
        .calls()
        .await
        .iter()
        .filter(|call| *call == &CatalogCall::UpsertTable("svc.db.public.orders".into()))
        .count();
    assert_eq!(upserts, 1);
}

#[tokio::test]
async fn lineage_edge_failure_surfaces_in_report() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_tables(vec![
        table(1, "orders", "h1", &["total", "cid"]),
        table(2, "customers", "h2", &["id", "name"]),
        view(
            3,
            "v_wide",
            "h3",
            "SELECT o.total AS t, c.name AS n FROM orders o JOIN customers c ON o.cid = c.id",
            &["t", "n"],
        ),
    ]);
    catalog.set_table_id("svc.db.public.orders", "id-orders").await;
    catalog.set_table_id("svc.db.public.customers", "id-customers").await;
    catalog.set_table_id("svc.db.public.v_wide", "id-view").await;
    catalog.fail_lineage_from("id-orders").await;

    let report = reconciler.run_sync(&scope()).await.unwrap();
    assert_eq!(report.lineage.views, 1);
    assert_eq!(report.lineage.edges_pushed, 1);
    assert_eq!(report.lineage.failed, 1);
    assert!(report.has_failures());

    assert!(catalog.calls().await.contains(&CatalogCall::PushLineage {
        from_id: "id-customers".into(),
        to_id: "id-view".into(),
    }));
}

#[tokio::test]
async fn clear_scope_purges_runtime_and_source() {
    let (source, catalog, reconciler) = fixture(5);
    source.set_databases(vec![database()]);
    source.set_schemas(vec![schema()]);
    source.set_tables(vec![table(1, "orders", "h1", &["id"])]);
    reconciler.run_sync(&scope()).await.unwrap();

    reconciler.clear_scope(&scope()).await.unwrap();
    assert!(reconciler.table_store().is_empty(&scope()));
    assert!(source.state.lock().unwrap().tables.is_empty());

    // the catalog was not told to delete anything
    let calls = catalog.calls().await;
    assert!(!calls.iter().any(|call| matches!(call, CatalogCall::Delete(..))));
}
