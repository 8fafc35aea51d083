//! Value types for clusters, plans, comparisons and persisted statuses.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Monthly price of one cluster footprint, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Price {
    pub storage: f64,
    pub instance: f64,
}

impl Price {
    pub fn new(storage: f64, instance: f64) -> Self {
        Self { storage, instance }
    }

    /// Storage plus instance cost.
    pub fn total(&self) -> f64 {
        self.storage + self.instance
    }
}

/// One region's footprint within a multi-region group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleCluster {
    pub id: String,
    /// Instance type → node count. Ordered so serialization is stable.
    pub infrastructure: BTreeMap<String, u32>,
    pub price: Price,
}

impl SingleCluster {
    pub fn new(id: impl Into<String>, infrastructure: BTreeMap<String, u32>, price: Price) -> Self {
        Self {
            id: id.into(),
            infrastructure,
            price,
        }
    }

    /// Total number of instances across all instance types.
    pub fn instance_count(&self) -> u64 {
        self.infrastructure.values().map(|&c| u64::from(c)).sum()
    }
}

/// One logical Active-Active deployment and its regional members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterGroup {
    pub id: String,
    pub members: Vec<SingleCluster>,
}

impl ClusterGroup {
    pub fn new(id: impl Into<String>, members: Vec<SingleCluster>) -> Self {
        Self {
            id: id.into(),
            members,
        }
    }

    /// Sum of member totals.
    pub fn total_price(&self) -> f64 {
        self.members.iter().map(|m| m.price.total()).sum()
    }
}

/// A current member matched with its planned counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPair {
    pub current: SingleCluster,
    pub optimal: SingleCluster,
}

impl ClusterPair {
    /// Current total minus optimal total. Negative when the plan costs more.
    pub fn savings(&self) -> f64 {
        self.current.price.total() - self.optimal.price.total()
    }
}

/// Per-member pairing of a group's current and optimal configurations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub group_id: String,
    pub pairs: Vec<ClusterPair>,
}

/// Aggregates derived from a [`ComparisonResult`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsMetrics {
    pub total_savings: f64,
    pub savings_percent: f64,
    pub total_instance_count: u64,
}

/// Latest known facts about a group. Every field but `group_id` is optional
/// because blueprints from different providers expose different subsets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub group_id: String,
    pub name: Option<String>,
    pub cloud_provider: Option<String>,
    pub region: Option<String>,
    pub software_version: Option<String>,
    pub creation_date: Option<String>,
    pub account_id: Option<String>,
    pub engine_version: Option<String>,
    pub multi_az: Option<bool>,
    pub availability_zones: Option<String>,
    pub storage_type: Option<String>,
    pub shards_count: Option<i64>,
    pub max_shards_count: Option<i64>,
    pub total_storage_gb: Option<i64>,
    pub data_nodes_count: Option<i64>,
    pub quorum_nodes_count: Option<i64>,
    pub total_nodes_count: Option<i64>,
    pub os_version: Option<String>,
    pub rof_enabled: Option<bool>,
}

impl ClusterMetadata {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------
// Persisted status enums
// ---------------------------------------------------------------

/// Lifecycle of a run row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Outcome of one group within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failure,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Which side of a comparison a persisted single belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Current,
    Optimal,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Optimal => "optimal",
        }
    }
}

macro_rules! impl_status_text {
    ($ty:ty { $($text:literal => $variant:expr),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($variant),)+
                    other => Err(Error::Database(format!(
                        "unknown {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

impl_status_text!(RunStatus {
    "in_progress" => RunStatus::InProgress,
    "completed" => RunStatus::Completed,
    "failed" => RunStatus::Failed,
});

impl_status_text!(ResultStatus {
    "success" => ResultStatus::Success,
    "failure" => ResultStatus::Failure,
});

impl_status_text!(Side {
    "current" => Side::Current,
    "optimal" => Side::Optimal,
});

#[cfg(test)]
mod tests {
    use super::*;

    fn single(id: &str, infra: &[(&str, u32)], storage: f64, instance: f64) -> SingleCluster {
        SingleCluster::new(
            id,
            infra.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            Price::new(storage, instance),
        )
    }

    #[test]
    fn test_price_total() {
        let p = Price::new(100.0, 500.0);
        assert_eq!(p.total(), 600.0);
        assert_eq!(Price::default().total(), 0.0);
    }

    #[test]
    fn test_instance_count() {
        let c = single("c1", &[("m5.xlarge", 3), ("r6g.large", 2)], 0.0, 0.0);
        assert_eq!(c.instance_count(), 5);
        assert_eq!(single("c2", &[], 0.0, 0.0).instance_count(), 0);
    }

    #[test]
    fn test_pair_savings_can_be_negative() {
        let pair = ClusterPair {
            current: single("c1", &[], 10.0, 20.0),
            optimal: single("c1", &[], 15.0, 25.0),
        };
        assert_eq!(pair.savings(), -10.0);
    }

    #[test]
    fn test_status_text_roundtrip() {
        for status in [RunStatus::InProgress, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert_eq!("failure".parse::<ResultStatus>().unwrap(), ResultStatus::Failure);
        assert_eq!("optimal".parse::<Side>().unwrap(), Side::Optimal);
        assert!("bogus".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_run_status_terminal() {
        assert!(!RunStatus::InProgress.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
