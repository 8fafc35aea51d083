//! Current vs. optimal comparison of one group.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use costplan_core::{ClusterGroup, ClusterPair, ComparisonResult, SavingsMetrics};

/// Why two configurations of a group could not be paired.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComparisonError {
    #[error("group id mismatch: current {current}, optimal {optimal}")]
    GroupMismatch { current: String, optimal: String },

    #[error("group {0} has no members")]
    Empty(String),

    #[error("member count differs: {current} current vs {optimal} optimal")]
    CountMismatch { current: usize, optimal: usize },

    #[error("duplicate member id {id} in {side} configuration")]
    DuplicateMember { id: String, side: &'static str },

    #[error("member {0} has no counterpart in the optimal plan")]
    Unmatched(String),
}

impl From<ComparisonError> for costplan_core::Error {
    fn from(err: ComparisonError) -> Self {
        costplan_core::Error::Comparison(err.to_string())
    }
}

/// Pairing plus the aggregates derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupComparison {
    pub result: ComparisonResult,
    pub metrics: SavingsMetrics,
}

fn check_unique(group: &ClusterGroup, side: &'static str) -> Result<(), ComparisonError> {
    let mut seen = HashSet::with_capacity(group.members.len());
    for member in &group.members {
        if !seen.insert(member.id.as_str()) {
            return Err(ComparisonError::DuplicateMember {
                id: member.id.clone(),
                side,
            });
        }
    }
    Ok(())
}

/// Pair members by id in the current configuration's order and compute the
/// savings of moving to the optimal plan.
pub fn compare(
    current: &ClusterGroup,
    optimal: &ClusterGroup,
) -> Result<GroupComparison, ComparisonError> {
    if current.id != optimal.id {
        return Err(ComparisonError::GroupMismatch {
            current: current.id.clone(),
            optimal: optimal.id.clone(),
        });
    }
    if current.members.is_empty() || optimal.members.is_empty() {
        return Err(ComparisonError::Empty(current.id.clone()));
    }
    if current.members.len() != optimal.members.len() {
        return Err(ComparisonError::CountMismatch {
            current: current.members.len(),
            optimal: optimal.members.len(),
        });
    }
    check_unique(current, "current")?;
    check_unique(optimal, "optimal")?;

    let by_id: HashMap<&str, _> = optimal
        .members
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();

    let pairs = current
        .members
        .iter()
        .map(|cur| {
            by_id
                .get(cur.id.as_str())
                .map(|opt| ClusterPair {
                    current: cur.clone(),
                    optimal: (*opt).clone(),
                })
                .ok_or_else(|| ComparisonError::Unmatched(cur.id.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let total_savings: f64 = pairs.iter().map(ClusterPair::savings).sum();
    let current_total = current.total_price();
    let savings_percent = if current_total == 0.0 {
        0.0
    } else {
        total_savings / current_total * 100.0
    };
    let total_instance_count = pairs.iter().map(|p| p.current.instance_count()).sum();

    Ok(GroupComparison {
        result: ComparisonResult {
            group_id: current.id.clone(),
            pairs,
        },
        metrics: SavingsMetrics {
            total_savings,
            savings_percent,
            total_instance_count,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use costplan_core::{Price, SingleCluster};

    fn single(id: &str, infra: &[(&str, u32)], storage: f64, instance: f64) -> SingleCluster {
        SingleCluster::new(
            id,
            infra.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            Price::new(storage, instance),
        )
    }

    fn group(id: &str, members: Vec<SingleCluster>) -> ClusterGroup {
        ClusterGroup::new(id, members)
    }

    #[test]
    fn test_single_member_savings() {
        let current = group("g1", vec![single("c1", &[("m5.2xlarge", 3)], 100.0, 500.0)]);
        let optimal = group("g1", vec![single("c1", &[("m5.xlarge", 3)], 80.0, 400.0)]);

        let cmp = compare(&current, &optimal).unwrap();
        assert_eq!(cmp.result.pairs.len(), 1);
        assert!((cmp.metrics.total_savings - 120.0).abs() < 1e-9);
        assert!((cmp.metrics.savings_percent - 20.0).abs() < 1e-9);
        assert_eq!(cmp.metrics.total_instance_count, 3);
    }

    #[test]
    fn test_pairs_follow_current_order() {
        let current = group(
            "g",
            vec![single("b", &[], 0.0, 10.0), single("a", &[], 0.0, 10.0)],
        );
        let optimal = group(
            "g",
            vec![single("a", &[], 0.0, 5.0), single("b", &[], 0.0, 5.0)],
        );
        let cmp = compare(&current, &optimal).unwrap();
        let ids: Vec<_> = cmp.result.pairs.iter().map(|p| p.current.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(cmp.result.pairs.iter().all(|p| p.current.id == p.optimal.id));
    }

    #[test]
    fn test_negative_savings_are_summed() {
        let current = group(
            "g",
            vec![
                single("east", &[("r6g.large", 2)], 10.0, 90.0),
                single("west", &[("r6g.large", 4)], 20.0, 180.0),
            ],
        );
        let optimal = group(
            "g",
            vec![
                single("east", &[("r6g.xlarge", 2)], 30.0, 120.0),
                single("west", &[("r6g.large", 2)], 10.0, 90.0),
            ],
        );
        let cmp = compare(&current, &optimal).unwrap();
        // east: 100 - 150 = -50, west: 200 - 100 = 100
        assert!((cmp.metrics.total_savings - 50.0).abs() < 1e-9);
        assert!((cmp.metrics.savings_percent - 50.0 / 300.0 * 100.0).abs() < 1e-9);
        assert_eq!(cmp.metrics.total_instance_count, 6);
    }

    #[test]
    fn test_zero_current_total() {
        let current = group("g", vec![single("c", &[], 0.0, 0.0)]);
        let optimal = group("g", vec![single("c", &[], 5.0, 5.0)]);
        let cmp = compare(&current, &optimal).unwrap();
        assert_eq!(cmp.metrics.total_savings, -10.0);
        assert_eq!(cmp.metrics.savings_percent, 0.0);
    }

    #[test]
    fn test_structural_failures() {
        let a = single("a", &[], 1.0, 1.0);
        let b = single("b", &[], 1.0, 1.0);

        assert!(matches!(
            compare(&group("g", vec![a.clone()]), &group("h", vec![a.clone()])),
            Err(ComparisonError::GroupMismatch { .. })
        ));
        assert_eq!(
            compare(&group("g", vec![]), &group("g", vec![])),
            Err(ComparisonError::Empty("g".into()))
        );
        assert!(matches!(
            compare(&group("g", vec![a.clone(), b.clone()]), &group("g", vec![a.clone()])),
            Err(ComparisonError::CountMismatch { current: 2, optimal: 1 })
        ));
        assert!(matches!(
            compare(&group("g", vec![a.clone(), a.clone()]), &group("g", vec![a.clone(), b.clone()])),
            Err(ComparisonError::DuplicateMember { side: "current", .. })
        ));
        assert_eq!(
            compare(&group("g", vec![a.clone()]), &group("g", vec![b.clone()])),
            Err(ComparisonError::Unmatched("a".into()))
        );
    }
}
