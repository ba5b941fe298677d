//! Per-cycle sync outcome accounting

/// Outcome of pushing one entity change to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Completed,
    SkippedCurated,
    Failed,
}

/// Counters for one push or delete stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub attempted: usize,
    pub completed: usize,
    pub skipped_curated: usize,
    pub failed: usize,
}

impl StageReport {
    pub fn from_outcomes(outcomes: &[PushOutcome]) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            report.attempted += 1;
            match outcome {
                PushOutcome::Completed => report.completed += 1,
                PushOutcome::SkippedCurated => report.skipped_curated += 1,
                PushOutcome::Failed => report.failed += 1,
            }
        }
        report
    }
}

/// Lineage work done for the views created or updated this cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineageReport {
    /// Views considered for lineage extraction.
    pub views: usize,

    /// Lineage edges actually pushed to the catalog.
    pub edges_pushed: usize,

    /// Failed edge pushes, plus views whose own catalog identity lookup
    /// failed.
    pub failed: usize,
}

/// What one sync cycle did, stage by stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub database_puts: StageReport,
    pub schema_puts: StageReport,
    pub table_puts: StageReport,
    pub lineage: LineageReport,
    pub table_deletes: StageReport,
    pub schema_deletes: StageReport,
    pub database_deletes: StageReport,
}

impl SyncReport {
    /// True when any stage recorded a per-entity failure. The cycle itself
    /// still completed; failed entities retry on the next cycle.
    pub fn has_failures(&self) -> bool {
        [
            self.database_puts,
            self.schema_puts,
            self.table_puts,
            self.table_deletes,
            self.schema_deletes,
            self.database_deletes,
        ]
        .iter()
        .any(|stage| stage.failed > 0)
            || self.lineage.failed > 0
    }
}
