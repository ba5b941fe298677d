//! Mock catalog client for testing
//!
//! Records every call in order, returns scripted curated flags and table
//! ids, and can fail individual FQNs or add latency. The in-flight
//! high-water mark lets tests assert the reconciler's concurrency bound.

use crate::client::{CatalogClient, CatalogError, CuratedLookup, EntityKind, TokenProvider};
use crate::dto::{DatabaseDto, LineageRequest, SchemaDto, TableDto};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One recorded catalog interaction, identified by the entity FQN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    UpsertDatabase(String),
    UpsertSchema(String),
    UpsertTable(String),
    Delete(EntityKind, String),
    CuratedFlag(String),
    ResolveTableId(String),
    PushLineage { from_id: String, to_id: String },
}

#[derive(Default)]
struct MockState {
    calls: Vec<CatalogCall>,

    /// Scripted curated-flag lookups. Absent FQNs resolve to `NotFound`.
    curated: HashMap<String, CuratedLookup>,

    /// FQNs whose curated lookup fails outright.
    curated_errors: HashSet<String>,

    /// Scripted table-id resolution. Absent FQNs resolve to `None`.
    table_ids: HashMap<String, String>,

    /// FQNs whose writes (upsert or delete) fail.
    failing: HashSet<String>,

    /// From-entity ids whose lineage edge pushes fail.
    failing_lineage: HashSet<String>,
}

/// In-memory `CatalogClient` double.
///
/// Clones share state, so a test can hand the clone to the reconciler and
/// keep the original for assertions.
pub struct MockCatalog {
    state: Arc<RwLock<MockState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    latency_ms: u64,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            latency_ms: 0,
        }
    }

    /// Add a delay to every call so concurrent calls overlap.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Script the curated flag returned for a table FQN.
    pub async fn set_curated(&self, fqn: impl Into<String>, lookup: CuratedLookup) {
        self.state.write().await.curated.insert(fqn.into(), lookup);
    }

    /// Make the curated-flag lookup for an FQN fail.
    pub async fn fail_curated(&self, fqn: impl Into<String>) {
        self.state.write().await.curated_errors.insert(fqn.into());
    }

    /// Script the catalog id returned for a table FQN.
    pub async fn set_table_id(&self, fqn: impl Into<String>, id: impl Into<String>) {
        self.state
            .write()
            .await
            .table_ids
            .insert(fqn.into(), id.into());
    }

    /// Make every write (upsert or delete) for an FQN fail.
    pub async fn fail_writes(&self, fqn: impl Into<String>) {
        self.state.write().await.failing.insert(fqn.into());
    }

    /// Make lineage pushes originating from a catalog id fail.
    pub async fn fail_lineage_from(&self, from_id: impl Into<String>) {
        self.state
            .write()
            .await
            .failing_lineage
            .insert(from_id.into());
    }

    /// All calls in arrival order.
    pub async fn calls(&self) -> Vec<CatalogCall> {
        self.state.read().await.calls.clone()
    }

    /// Highest number of simultaneously in-flight calls observed.
    pub fn max_observed_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    async fn record(&self, call: CatalogCall) {
        self.state.write().await.calls.push(call);
    }

    async fn check_write(&self, fqn: &str) -> Result<(), CatalogError> {
        if self.state.read().await.failing.contains(fqn) {
            return Err(CatalogError::Status {
                status: 500,
                body: format!("scripted failure for {fqn}"),
            });
        }
        Ok(())
    }
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockCatalog {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            in_flight: Arc::clone(&self.in_flight),
            max_in_flight: Arc::clone(&self.max_in_flight),
            latency_ms: self.latency_ms,
        }
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn upsert_database(&self, dto: &DatabaseDto) -> Result<(), CatalogError> {
        let _guard = self.enter().await;
        let fqn = format!("{}.{}", dto.service, dto.name);
        self.record(CatalogCall::UpsertDatabase(fqn.clone())).await;
        self.check_write(&fqn).await
    }

    async fn upsert_schema(&self, dto: &SchemaDto) -> Result<(), CatalogError> {
        let _guard = self.enter().await;
        let fqn = format!("{}.{}", dto.database, dto.name);
        self.record(CatalogCall::UpsertSchema(fqn.clone())).await;
        self.check_write(&fqn).await
    }

    async fn upsert_table(&self, dto: &TableDto) -> Result<(), CatalogError> {
        let _guard = self.enter().await;
        let fqn = format!("{}.{}", dto.database_schema, dto.name);
        self.record(CatalogCall::UpsertTable(fqn.clone())).await;
        self.check_write(&fqn).await
    }

    async fn delete_entity(&self, kind: EntityKind, fqn: &str) -> Result<(), CatalogError> {
        let _guard = self.enter().await;
        self.record(CatalogCall::Delete(kind, fqn.to_string())).await;
        self.check_write(fqn).await
    }

    async fn curated_flag(&self, fqn: &str) -> Result<CuratedLookup, CatalogError> {
        let _guard = self.enter().await;
        self.record(CatalogCall::CuratedFlag(fqn.to_string())).await;

        let state = self.state.read().await;
        if state.curated_errors.contains(fqn) {
            return Err(CatalogError::Status {
                status: 503,
                body: format!("scripted lookup failure for {fqn}"),
            });
        }
        Ok(state
            .curated
            .get(fqn)
            .copied()
            .unwrap_or(CuratedLookup::NotFound))
    }

    async fn resolve_table_id(&self, fqn: &str) -> Result<Option<String>, CatalogError> {
        let _guard = self.enter().await;
        self.record(CatalogCall::ResolveTableId(fqn.to_string()))
            .await;
        Ok(self.state.read().await.table_ids.get(fqn).cloned())
    }

    async fn push_lineage(&self, request: &LineageRequest) -> Result<(), CatalogError> {
        let _guard = self.enter().await;
        let from_id = request.edge.from_entity.id.clone();
        self.record(CatalogCall::PushLineage {
            from_id: from_id.clone(),
            to_id: request.edge.to_entity.id.clone(),
        })
        .await;

        if self.state.read().await.failing_lineage.contains(&from_id) {
            return Err(CatalogError::Status {
                status: 500,
                body: format!("scripted lineage failure from {from_id}"),
            });
        }
        Ok(())
    }
}

/// Token provider that always fails, for exercising auth error paths.
pub struct FailingTokenProvider;

#[async_trait]
impl TokenProvider for FailingTokenProvider {
    async fn access_token(&self) -> Result<String, CatalogError> {
        Err(CatalogError::Token("scripted token failure".to_string()))
    }
}
