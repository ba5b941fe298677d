//! Cache comparison result
//!
//! The three maps are disjoint by construction: the diff engine assigns
//! each key to exactly one of them. `put_records` is the derived
//! create-or-update view.

use crate::entity::EntityId;
use std::collections::HashMap;

/// Outcome of diffing a runtime cache against a fresh snapshot.
#[derive(Debug, Clone)]
pub struct ComparisonResult<T> {
    /// In the snapshot but not in the runtime cache (value from snapshot).
    pub new: HashMap<EntityId, T>,

    /// In both, with a different content hash (value from snapshot).
    pub modified: HashMap<EntityId, T>,

    /// In the runtime cache but no longer in the snapshot (last known
    /// value, taken from the runtime cache).
    pub deleted: HashMap<EntityId, T>,
}

impl<T> Default for ComparisonResult<T> {
    fn default() -> Self {
        Self {
            new: HashMap::new(),
            modified: HashMap::new(),
            deleted: HashMap::new(),
        }
    }
}

impl<T: Clone> ComparisonResult<T> {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Everything that needs a create-or-update push: new ∪ modified.
    pub fn put_records(&self) -> HashMap<EntityId, T> {
        let mut put = self.new.clone();
        put.extend(
            self.modified
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        put
    }

    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.modified.is_empty() || !self.deleted.is_empty()
    }
}
