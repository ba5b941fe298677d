//! Reconciliation orchestrator
//!
//! One `run_sync` call is a full cycle for one (schema, service) scope:
//! load the fresh source snapshot, diff it against the runtime caches,
//! then push the differences to the catalog in dependency order. Creates
//! and updates flow parent-first (database, schema, table), deletes flow
//! child-first. Entities the catalog marks as curated are never written.
//!
//! Per-entity catalog failures are isolated: they are logged, counted in
//! the report and retried naturally on the next cycle, because the runtime
//! cache already reflects the snapshot.

use crate::fanout::for_each_bounded;
use crate::lineage;
use crate::report::{LineageReport, PushOutcome, StageReport, SyncReport};
use metasync_cache::{MetadataSource, MetadataStore, Snapshot, SourceError};
use metasync_catalog::{
    database_dto, schema_dto, table_dto, CatalogClient, CuratedLookup, EntityKind,
};
use metasync_core::{
    DatabaseRecord, Record, SchemaRecord, Scope, SourceKind, SyncConfig, TableRecord,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a whole sync cycle. Per-entity catalog failures never
/// surface here; they live in the `SyncReport`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no source kind configured for schema {0:?}")]
    UnknownSchema(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Drives sync cycles against one catalog, holding the runtime caches for
/// all scopes.
pub struct Reconciler {
    config: SyncConfig,
    source: Arc<dyn MetadataSource>,
    catalog: Arc<dyn CatalogClient>,
    databases: MetadataStore<DatabaseRecord>,
    schemas: MetadataStore<SchemaRecord>,
    tables: Arc<MetadataStore<TableRecord>>,

    /// Per-scope cycle locks; concurrent syncs of the same scope serialize,
    /// different scopes proceed independently.
    scope_locks: Mutex<HashMap<Scope, Arc<tokio::sync::Mutex<()>>>>,
}

impl Reconciler {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn MetadataSource>,
        catalog: Arc<dyn CatalogClient>,
    ) -> Self {
        Self {
            config,
            source,
            catalog,
            databases: MetadataStore::new("database"),
            schemas: MetadataStore::new("schema"),
            tables: Arc::new(MetadataStore::new("table")),
            scope_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one full sync cycle for a scope.
    pub async fn run_sync(&self, scope: &Scope) -> Result<SyncReport, SyncError> {
        let kind = self
            .config
            .schemas
            .resolve(&scope.schema_name)
            .ok_or_else(|| SyncError::UnknownSchema(scope.schema_name.clone()))?;

        let lock = self.scope_lock(scope);
        let _cycle = lock.lock().await;

        info!(%scope, source = kind.as_str(), "starting sync cycle");

        // Any source failure aborts the cycle before the runtime caches or
        // the catalog are touched.
        let database_rows = self.source.load_databases(scope).await?;
        let schema_rows = self.source.load_schemas(scope).await?;
        let table_rows = self.source.load_tables(scope).await?;

        let database_changes = self
            .databases
            .sync_snapshot(scope, Snapshot::from_rows(database_rows));
        let schema_changes = self
            .schemas
            .sync_snapshot(scope, Snapshot::from_rows(schema_rows));
        let table_changes = self
            .tables
            .sync_snapshot(scope, Snapshot::from_rows(table_rows));

        let mut report = SyncReport::default();

        report.database_puts = self
            .push_stage(
                database_changes.put_records().into_values().collect(),
                |catalog, record: DatabaseRecord| async move {
                    catalog.upsert_database(&database_dto(&record)).await
                },
            )
            .await;
        report.schema_puts = self
            .push_stage(
                schema_changes.put_records().into_values().collect(),
                |catalog, record: SchemaRecord| async move {
                    catalog.upsert_schema(&schema_dto(&record)).await
                },
            )
            .await;

        let put_tables: Vec<TableRecord> = table_changes.put_records().into_values().collect();
        report.table_puts = self.push_tables(put_tables.clone(), kind).await;
        report.lineage = self.push_lineage_for_views(scope, &put_tables).await;

        report.table_deletes = self
            .delete_tables(table_changes.deleted.values().cloned().collect())
            .await;
        report.schema_deletes = self
            .delete_stage(EntityKind::Schema, fqns(schema_changes.deleted.values()))
            .await;
        report.database_deletes = self
            .delete_stage(EntityKind::Database, fqns(database_changes.deleted.values()))
            .await;

        info!(
            %scope,
            tables_put = report.table_puts.completed,
            tables_deleted = report.table_deletes.completed,
            lineage_edges = report.lineage.edges_pushed,
            failures = report.has_failures(),
            "sync cycle finished"
        );
        Ok(report)
    }

    /// Drop everything known about a scope: the persisted source rows and
    /// the runtime caches. The catalog is left untouched.
    pub async fn clear_scope(&self, scope: &Scope) -> Result<(), SyncError> {
        let lock = self.scope_lock(scope);
        let _cycle = lock.lock().await;

        self.source.delete_by_scope(scope).await?;
        self.databases.destroy(scope);
        self.schemas.destroy(scope);
        self.tables.destroy(scope);
        info!(%scope, "cleared scope");
        Ok(())
    }

    pub fn table_store(&self) -> &MetadataStore<TableRecord> {
        &self.tables
    }

    fn scope_lock(&self, scope: &Scope) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.scope_locks.lock().expect("scope lock registry poisoned");
        Arc::clone(locks.entry(scope.clone()).or_default())
    }

    /// Fan a put stage out over the catalog with the configured bound.
    async fn push_stage<T, F, Fut>(&self, records: Vec<T>, op: F) -> StageReport
    where
        T: Record,
        F: Fn(Arc<dyn CatalogClient>, T) -> Fut,
        Fut: std::future::Future<Output = Result<(), metasync_catalog::CatalogError>>
            + Send
            + 'static,
    {
        let outcomes = for_each_bounded(self.config.max_in_flight, records, |record| {
            let catalog = Arc::clone(&self.catalog);
            let fqn = record.fqn().to_string();
            let work = op(catalog, record);
            async move {
                match work.await {
                    Ok(()) => PushOutcome::Completed,
                    Err(e) => {
                        warn!(%fqn, error = %e, "catalog upsert failed");
                        PushOutcome::Failed
                    }
                }
            }
        })
        .await;
        StageReport::from_outcomes(&outcomes)
    }

    /// Table puts carry the curated guard: a table the catalog marks as
    /// curated is never overwritten, and a failed guard lookup blocks the
    /// write rather than risking one.
    async fn push_tables(&self, records: Vec<TableRecord>, kind: SourceKind) -> StageReport {
        let outcomes = for_each_bounded(self.config.max_in_flight, records, |record| {
            let catalog = Arc::clone(&self.catalog);
            async move {
                match catalog.curated_flag(&record.fqn).await {
                    Ok(CuratedLookup::Flag(true)) => {
                        debug!(fqn = %record.fqn, "curated in the catalog, leaving untouched");
                        return PushOutcome::SkippedCurated;
                    }
                    Ok(CuratedLookup::Flag(false)) | Ok(CuratedLookup::NotFound) => {}
                    Err(e) => {
                        warn!(fqn = %record.fqn, error = %e, "curated lookup failed, not upserting");
                        return PushOutcome::Failed;
                    }
                }
                match catalog.upsert_table(&table_dto(&record, kind)).await {
                    Ok(()) => PushOutcome::Completed,
                    Err(e) => {
                        warn!(fqn = %record.fqn, error = %e, "table upsert failed");
                        PushOutcome::Failed
                    }
                }
            }
        })
        .await;
        StageReport::from_outcomes(&outcomes)
    }

    /// Table deletes carry the same guard. A table the catalog no longer
    /// knows needs no delete; a curated one must not be deleted.
    async fn delete_tables(&self, records: Vec<TableRecord>) -> StageReport {
        let outcomes = for_each_bounded(self.config.max_in_flight, records, |record| {
            let catalog = Arc::clone(&self.catalog);
            async move {
                match catalog.curated_flag(&record.fqn).await {
                    Ok(CuratedLookup::Flag(true)) => {
                        debug!(fqn = %record.fqn, "curated in the catalog, not deleting");
                        return PushOutcome::SkippedCurated;
                    }
                    Ok(CuratedLookup::NotFound) => {
                        debug!(fqn = %record.fqn, "already absent from the catalog");
                        return PushOutcome::Completed;
                    }
                    Ok(CuratedLookup::Flag(false)) => {}
                    Err(e) => {
                        warn!(fqn = %record.fqn, error = %e, "curated lookup failed, not deleting");
                        return PushOutcome::Failed;
                    }
                }
                match catalog.delete_entity(EntityKind::Table, &record.fqn).await {
                    Ok(()) => PushOutcome::Completed,
                    Err(e) => {
                        warn!(fqn = %record.fqn, error = %e, "table delete failed");
                        PushOutcome::Failed
                    }
                }
            }
        })
        .await;
        StageReport::from_outcomes(&outcomes)
    }

    async fn delete_stage(&self, kind: EntityKind, fqns: Vec<String>) -> StageReport {
        let outcomes = for_each_bounded(self.config.max_in_flight, fqns, |fqn| {
            let catalog = Arc::clone(&self.catalog);
            async move {
                match catalog.delete_entity(kind, &fqn).await {
                    Ok(()) => PushOutcome::Completed,
                    Err(e) => {
                        warn!(%fqn, entity = %kind, error = %e, "catalog delete failed");
                        PushOutcome::Failed
                    }
                }
            }
        })
        .await;
        StageReport::from_outcomes(&outcomes)
    }

    /// Lineage for the views created or updated this cycle. Sequential by
    /// design so catalog id memoization works across views.
    async fn push_lineage_for_views(
        &self,
        scope: &Scope,
        put_tables: &[TableRecord],
    ) -> LineageReport {
        let mut report = LineageReport::default();
        let mut id_cache: HashMap<String, Option<String>> = HashMap::new();

        let tables = Arc::clone(&self.tables);
        let lookup_scope = scope.clone();
        let lookup = move |fqn: &str| tables.find_by_fqn(&lookup_scope, fqn);

        for view in put_tables.iter().filter(|t| t.is_view()) {
            report.views += 1;
            match lineage::push_view_lineage(
                self.catalog.as_ref(),
                view,
                &lookup,
                &self.config.fallback_schemas,
                &mut id_cache,
            )
            .await
            {
                Ok(push) => {
                    report.edges_pushed += push.edges_pushed;
                    report.failed += push.edges_failed;
                }
                Err(e) => {
                    warn!(view = %view.fqn, error = %e, "lineage push failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn fqns<'a, T: Record>(records: impl Iterator<Item = &'a T>) -> Vec<String> {
    records.map(|record| record.fqn().to_string()).collect()
}
