//! Runtime types.

use std::collections::BTreeSet;
use std::time::Duration;

use costplan_core::{RunStatus, Settings};
use serde::Serialize;

/// Per-invocation knobs.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// First N groups after filtering. `None` or 0 processes all.
    pub limit: Option<usize>,
    /// Free-form reference stored on the run row.
    pub ticket: Option<String>,
    pub exclude: BTreeSet<String>,
    /// Sweep `in_progress` runs older than this before starting.
    pub stale_after: Option<Duration>,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            limit: None,
            ticket: None,
            exclude: settings.exclude_ids.clone(),
            stale_after: settings.stale_run_after,
        }
    }
}

/// Outcome of one orchestrated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: i64,
    pub status: RunStatus,
    pub total_groups: usize,
    pub processed: usize,
    pub failed: usize,
    /// Sum of savings over successful groups.
    pub total_savings: f64,
}

impl RunSummary {
    pub(crate) fn started(run_id: i64, total_groups: usize) -> Self {
        Self {
            run_id,
            status: RunStatus::InProgress,
            total_groups,
            processed: 0,
            failed: 0,
            total_savings: 0.0,
        }
    }
}
