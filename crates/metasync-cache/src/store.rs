//! Long-lived runtime metadata cache
//!
//! One `MetadataStore` per metadata kind. Each store keeps an independent
//! cache per (schema, service) scope, created lazily and kept until
//! explicitly destroyed. The store holds "what we last told the catalog";
//! the only writer for a scope is the apply step of that scope's sync.

use crate::diff;
use crate::snapshot::Snapshot;
use metasync_core::{ComparisonResult, EntityId, Record, Scope};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

struct ScopeCache<T> {
    records: HashMap<EntityId, T>,
    fqn_index: HashMap<String, EntityId>,
}

impl<T: Record> ScopeCache<T> {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            fqn_index: HashMap::new(),
        }
    }

    fn rebuild_fqn_index(&mut self) {
        self.fqn_index.clear();
        for (key, record) in &self.records {
            self.fqn_index
                .insert(record.fqn().to_string(), key.clone());
        }
    }
}

/// Per-kind registry of runtime caches, keyed by scope.
pub struct MetadataStore<T> {
    /// Kind label used in log lines ("database", "schema", "table").
    kind: &'static str,
    caches: RwLock<HashMap<Scope, ScopeCache<T>>>,
}

impl<T: Record> MetadataStore<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            caches: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Ensure the cache for a scope exists. Idempotent.
    pub fn get_or_create(&self, scope: &Scope) {
        if let Ok(mut caches) = self.caches.write() {
            caches.entry(scope.clone()).or_insert_with(ScopeCache::new);
        }
    }

    /// Remove and discard a scope's cache. No error when absent.
    pub fn destroy(&self, scope: &Scope) {
        if let Ok(mut caches) = self.caches.write() {
            if caches.remove(scope).is_some() {
                debug!(kind = self.kind, scope = %scope, "destroyed runtime cache");
            }
        }
    }

    /// Key/value snapshot of a scope's cache as of scan start.
    pub fn entries(&self, scope: &Scope) -> HashMap<EntityId, T> {
        self.caches
            .read()
            .ok()
            .and_then(|caches| caches.get(scope).map(|cache| cache.records.clone()))
            .unwrap_or_default()
    }

    pub fn len(&self, scope: &Scope) -> usize {
        self.caches
            .read()
            .ok()
            .and_then(|caches| caches.get(scope).map(|cache| cache.records.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, scope: &Scope) -> bool {
        self.len(scope) == 0
    }

    /// FQN → record lookup against the per-scope index.
    pub fn find_by_fqn(&self, scope: &Scope, fqn: &str) -> Option<T> {
        let caches = self.caches.read().ok()?;
        let cache = caches.get(scope)?;
        let key = cache.fqn_index.get(fqn)?;
        cache.records.get(key).cloned()
    }

    /// Apply a comparison result: remove every deleted key, then upsert
    /// every put (new + modified) record. Rebuilds the FQN index.
    pub fn apply(&self, scope: &Scope, changes: &ComparisonResult<T>) {
        let Ok(mut caches) = self.caches.write() else {
            warn!(kind = self.kind, scope = %scope, "cache lock poisoned, dropping apply");
            return;
        };
        let cache = caches.entry(scope.clone()).or_insert_with(ScopeCache::new);

        for key in changes.deleted.keys() {
            cache.records.remove(key);
        }
        for (key, record) in changes.put_records() {
            cache.records.insert(key, record);
        }
        cache.rebuild_fqn_index();
    }

    /// Diff the runtime cache against a snapshot and apply the result.
    /// The snapshot is consumed and dropped here, win or lose.
    pub fn sync_snapshot(&self, scope: &Scope, snapshot: Snapshot<T>) -> ComparisonResult<T> {
        let Ok(mut caches) = self.caches.write() else {
            warn!(kind = self.kind, scope = %scope, "cache lock poisoned, reporting no changes");
            return ComparisonResult::new_empty();
        };
        let cache = caches.entry(scope.clone()).or_insert_with(ScopeCache::new);

        let changes = diff::compare(&cache.records, snapshot.records());

        for key in changes.deleted.keys() {
            cache.records.remove(key);
        }
        for (key, record) in changes.put_records() {
            cache.records.insert(key, record);
        }
        cache.rebuild_fqn_index();

        debug!(
            kind = self.kind,
            scope = %scope,
            new = changes.new.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            "synchronized runtime cache"
        );

        changes
    }

    /// Scopes with a live cache.
    pub fn scopes(&self) -> Vec<Scope> {
        self.caches
            .read()
            .map(|caches| caches.keys().cloned().collect())
            .unwrap_or_default()
    }
}
