use std::fmt;
use std::path::PathBuf;

use crate::target::Target;

/// How a target's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// Converged and written to its output file.
    Persisted,
    /// Gave up: retries exhausted, never converged, or the write failed.
    Failed { reason: String },
    /// Still queued or in flight when the run was cancelled.
    Abandoned,
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOutcome::Persisted => write!(f, "persisted"),
            TargetOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            TargetOutcome::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Final record for one target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub url: String,
    pub output: PathBuf,
    /// Unique items accumulated (and, if persisted, written).
    pub items: usize,
    /// Successful snapshots merged.
    pub samples: u32,
    pub fetch_failures: u32,
    pub outcome: TargetOutcome,
}

impl TargetReport {
    pub fn new(target: &Target, outcome: TargetOutcome) -> Self {
        Self {
            url: target.source().url.to_string(),
            output: target.output().to_path_buf(),
            items: target.items().len(),
            samples: target.samples(),
            fetch_failures: target.fetch_failures(),
            outcome,
        }
    }
}

/// Aggregated result of one pool run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<TargetReport>,
}

impl RunSummary {
    pub fn persisted(&self) -> impl Iterator<Item = &TargetReport> {
        self.reports
            .iter()
            .filter(|r| r.outcome == TargetOutcome::Persisted)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::Failed { .. }))
    }

    pub fn abandoned(&self) -> impl Iterator<Item = &TargetReport> {
        self.reports
            .iter()
            .filter(|r| r.outcome == TargetOutcome::Abandoned)
    }

    /// True when every target was persisted.
    pub fn is_success(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.outcome == TargetOutcome::Persisted)
    }
}
