//! Snapshot loading from the relational metadata source
//!
//! The source is an external collaborator: it returns fully populated
//! records for one scope. The snapshot itself is a disposable owned map;
//! dropping it after comparison releases the resource no matter how the
//! cycle ends.

use async_trait::async_trait;
use metasync_core::{DatabaseRecord, EntityId, Record, SchemaRecord, Scope, TableRecord};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from the relational metadata source. Any of these is fatal for
/// the current sync cycle; no partial snapshot is ever used.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source read failed: {0}")]
    Read(String),

    #[error("source returned malformed data: {0}")]
    Malformed(String),
}

/// Boundary contract for the relational store holding scraped metadata
/// rows. Implementations live outside this crate; tests use an in-memory
/// source.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn load_databases(&self, scope: &Scope) -> Result<Vec<DatabaseRecord>, SourceError>;

    async fn load_schemas(&self, scope: &Scope) -> Result<Vec<SchemaRecord>, SourceError>;

    async fn load_tables(&self, scope: &Scope) -> Result<Vec<TableRecord>, SourceError>;

    /// Purge all persisted rows for a scope on the source side.
    async fn delete_by_scope(&self, scope: &Scope) -> Result<(), SourceError>;
}

/// Ephemeral, per-cycle materialization of the source rows for one scope.
///
/// Always fully populated: zero rows yield an empty snapshot, never an
/// absent one. Never touches the runtime store.
#[derive(Debug)]
pub struct Snapshot<T> {
    records: HashMap<EntityId, T>,
}

impl<T: Record> Snapshot<T> {
    pub fn from_rows(rows: Vec<T>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| (row.entity_id().clone(), row))
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &HashMap<EntityId, T> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasync_core::DatabaseRecord;

    #[test]
    fn zero_rows_is_an_empty_snapshot_not_an_absent_one() {
        let snapshot: Snapshot<DatabaseRecord> = Snapshot::from_rows(vec![]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }

    #[test]
    fn rows_are_keyed_by_entity_id() {
        let row = DatabaseRecord {
            id: EntityId::new(42, "svc"),
            fqn: "svc.sales".into(),
            name: "sales".into(),
            service_name: "svc".into(),
            hash_data: Some("h".into()),
        };
        let snapshot = Snapshot::from_rows(vec![row.clone()]);
        assert_eq!(snapshot.records()[&row.id].fqn, "svc.sales");
    }
}
