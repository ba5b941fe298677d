//! Reconciliation engine
//!
//! Ties the other crates together: per-scope sync cycles that snapshot the
//! source, diff against the runtime caches, and push ordered, bounded,
//! curated-guarded changes to the catalog, with view lineage extraction
//! for every view the cycle created or updated.

pub mod fanout;
mod lineage;
pub mod reconciler;
pub mod report;

pub use fanout::for_each_bounded;
pub use reconciler::{Reconciler, SyncError};
pub use report::{LineageReport, PushOutcome, StageReport, SyncReport};
