//! Row types returned by the store's query surface.

use costplan_core::{ClusterMetadata, ResultStatus, RunStatus};
use serde::{Deserialize, Serialize};

/// A run row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: i64,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_ticket: Option<String>,
    pub total_groups: i64,
    pub processed_count: i64,
    pub failed_count: i64,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RunRecord {
    /// Groups that have not been recorded yet.
    pub fn remaining(&self) -> i64 {
        self.total_groups - self.processed_count - self.failed_count
    }
}

/// One group's outcome in a run, with side totals and the latest metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub result_id: i64,
    pub run_id: i64,
    pub group_id: String,
    pub processed_at: String,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub total_savings: f64,
    pub savings_percent: f64,
    pub total_instance_count: i64,
    /// Sum of `total_price` over current-side singles.
    pub current_price: f64,
    /// Sum of `total_price` over optimal-side singles.
    pub optimal_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ClusterMetadata>,
}

/// One successful result for a group, keyed by the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub run_id: i64,
    pub started_at: String,
    pub requested_ticket: Option<String>,
    pub current_price: f64,
    pub optimal_price: f64,
    pub total_savings: f64,
    pub savings_percent: f64,
}

/// Savings aggregated over one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub run_id: i64,
    pub started_at: String,
    pub requested_ticket: Option<String>,
    pub group_count: i64,
    pub total_current: f64,
    pub total_optimal: f64,
    pub total_savings: f64,
    pub savings_percent: f64,
}
