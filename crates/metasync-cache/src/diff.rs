//! Cache diff engine
//!
//! Pure set algebra over `EntityId` keys with content-hash comparison for
//! the common keys. No ordering, no side effects on either cache.

use metasync_core::{ComparisonResult, EntityId, Record};
use std::collections::HashMap;

/// Compare the runtime cache against a freshly loaded snapshot.
///
/// - `new` = snapshot − runtime, valued from the snapshot
/// - `deleted` = runtime − snapshot, valued from the runtime cache (the
///   last known state; the snapshot no longer carries the record)
/// - `modified` = common keys whose hashes differ, valued from the
///   snapshot (the new truth)
///
/// Hash comparison is null-safe: `None != Some(_)` counts as a change,
/// `None == None` does not.
pub fn compare<T: Record>(
    runtime: &HashMap<EntityId, T>,
    snapshot: &HashMap<EntityId, T>,
) -> ComparisonResult<T> {
    let mut result = ComparisonResult::default();

    for (key, snapshot_record) in snapshot {
        match runtime.get(key) {
            None => {
                result.new.insert(key.clone(), snapshot_record.clone());
            }
            Some(runtime_record) => {
                if runtime_record.hash_data() != snapshot_record.hash_data() {
                    result.modified.insert(key.clone(), snapshot_record.clone());
                }
            }
        }
    }

    for (key, runtime_record) in runtime {
        if !snapshot.contains_key(key) {
            result.deleted.insert(key.clone(), runtime_record.clone());
        }
    }

    result
}
