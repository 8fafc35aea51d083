//! Blueprint documents into engine value types.

use std::collections::{BTreeMap, BTreeSet};

use costplan_core::{ClusterGroup, ClusterMetadata, Price, SingleCluster};

use crate::dto::{Blueprint, BlueprintDocument, MemberBlueprint};
use crate::error::RemoteError;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn price_field(value: Option<f64>, field: &str, cluster_uid: &str) -> Result<f64, RemoteError> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(round_cents(v)),
        Some(v) => Err(RemoteError::Malformed(format!(
            "cluster {}: usd_per_month.{} is {}",
            cluster_uid, field, v
        ))),
        None => Err(RemoteError::Malformed(format!(
            "cluster {}: usd_per_month.{} missing",
            cluster_uid, field
        ))),
    }
}

fn to_single(member: &MemberBlueprint) -> Result<SingleCluster, RemoteError> {
    let uid = &member.cluster_uid;
    let cost = member
        .blueprint
        .usd_per_month
        .ok_or_else(|| RemoteError::Malformed(format!("cluster {}: usd_per_month missing", uid)))?;

    let price = Price::new(
        price_field(cost.storage, "storage", uid)?,
        price_field(cost.cluster, "cluster", uid)?,
    );

    let mut infrastructure = BTreeMap::new();
    for node in &member.blueprint.nodes {
        *infrastructure.entry(node.instance_type.clone()).or_insert(0u32) += 1;
    }

    Ok(SingleCluster::new(uid.clone(), infrastructure, price))
}

/// Normalize a blueprint or plan into a [`ClusterGroup`].
pub fn to_cluster_group(group_id: &str, doc: &BlueprintDocument) -> Result<ClusterGroup, RemoteError> {
    let members = doc
        .blueprints
        .iter()
        .map(to_single)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ClusterGroup::new(group_id, members))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn joined(set: BTreeSet<String>) -> Option<String> {
    if set.is_empty() {
        None
    } else {
        Some(set.into_iter().collect::<Vec<_>>().join(","))
    }
}

/// Group facts read from the first member's blueprint. `None` when the
/// document has no members.
pub fn extract_metadata(group_id: &str, doc: &BlueprintDocument) -> Option<ClusterMetadata> {
    let first: &Blueprint = &doc.blueprints.first()?.blueprint;
    let mut meta = ClusterMetadata::new(group_id);

    let provider = first
        .cloud
        .provider
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cloud = &first.cloud;

    meta.cloud_provider = match provider.as_str() {
        "aws" => Some("AWS".to_string()),
        "gcp" => Some("GCP".to_string()),
        "azure" => Some("Azure".to_string()),
        _ => None,
    };
    meta.region = match provider.as_str() {
        "aws" => non_empty(cloud.region.as_ref()),
        "gcp" => non_empty(cloud.gcp.as_ref().and_then(|r| r.region.as_ref())),
        "azure" => non_empty(cloud.azure.as_ref().and_then(|r| r.region.as_ref())),
        _ => None,
    };
    meta.account_id = non_empty(cloud.account_id.as_ref());

    let cluster = &first.cluster;
    meta.name = non_empty(cluster.name.as_ref());
    meta.engine_version = non_empty(cluster.redis_version.as_ref());
    meta.multi_az = Some(cluster.multi_az.unwrap_or(false));
    meta.shards_count = cluster.shards_count;
    meta.max_shards_count = cluster.max_shards_count;
    meta.os_version = non_empty(cluster.desired_os_version.as_ref());
    meta.software_version = non_empty(cluster.desired_software_version.as_ref());
    meta.rof_enabled = Some(cluster.rof.unwrap_or(false));

    meta.creation_date = first
        .metadata
        .creation_time
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| t.split('T').next().unwrap_or(t).to_string());

    let mut zones = BTreeSet::new();
    let mut storage_types = BTreeSet::new();
    let mut storage_gb = 0.0;
    let mut data_nodes = 0i64;
    let mut quorum_nodes = 0i64;

    for node in &first.nodes {
        if let Some(zone) = &node.availability_zone {
            zones.insert(zone.clone());
        }
        if node.quorum_only {
            quorum_nodes += 1;
        } else {
            data_nodes += 1;
        }

        match provider.as_str() {
            "aws" => {
                if let Some(ebs) = &node.ebs_volume {
                    storage_types.extend(ebs.volume_type.clone());
                    storage_gb += ebs.volume_size.unwrap_or(0.0);
                }
            }
            "gcp" | "azure" => {
                let disks = if provider == "gcp" {
                    &node.gcp_disks
                } else {
                    &node.azure_disks
                };
                for disk in disks {
                    storage_types.extend(disk.disk_type.clone());
                    storage_gb += disk.size.unwrap_or(0.0);
                }
            }
            _ => {}
        }
    }

    meta.availability_zones = joined(zones);
    meta.storage_type = joined(storage_types);
    meta.total_storage_gb = (storage_gb > 0.0).then(|| storage_gb.round() as i64);
    meta.data_nodes_count = Some(data_nodes);
    meta.quorum_nodes_count = Some(quorum_nodes);
    meta.total_nodes_count = Some(data_nodes + quorum_nodes);

    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> BlueprintDocument {
        serde_json::from_value(value).unwrap()
    }

    fn aws_group() -> BlueprintDocument {
        doc(json!({
            "blueprints": [
                {
                    "cluster_uid": "east",
                    "blueprint": {
                        "usd_per_month": {"cluster": 500.004, "storage": 99.996},
                        "cloud": {"provider": "AWS", "region": "us-east-1"},
                        "cluster": {
                            "name": "orders",
                            "redis_version": "7.2",
                            "multi_az": true,
                            "shards_count": 4,
                            "max_shards_count": 16,
                            "desired_os_version": "ubuntu-22.04",
                            "desired_software_version": "7.4.2-54",
                            "rof": false
                        },
                        "metadata": {"creation_time": "2024-03-09T12:30:00Z"},
                        "nodes": [
                            {"instance_type": "m5.2xlarge", "availability_zone": "us-east-1b",
                             "ebs_volume": {"volume_type": "gp3", "volume_size": 100}},
                            {"instance_type": "m5.2xlarge", "availability_zone": "us-east-1a",
                             "ebs_volume": {"volume_type": "gp3", "volume_size": 100}},
                            {"instance_type": "m5.large", "availability_zone": "us-east-1c",
                             "quorum_only": true,
                             "ebs_volume": {"volume_type": "io2", "volume_size": 20}}
                        ]
                    }
                },
                {
                    "cluster_uid": "west",
                    "blueprint": {
                        "usd_per_month": {"cluster": 120.0, "storage": 30.0},
                        "nodes": [{"instance_type": "m5.large"}]
                    }
                }
            ]
        }))
    }

    #[test]
    fn test_to_cluster_group() {
        let group = to_cluster_group("mc-1", &aws_group()).unwrap();
        assert_eq!(group.id, "mc-1");
        assert_eq!(group.members.len(), 2);

        let east = &group.members[0];
        assert_eq!(east.id, "east");
        assert_eq!(east.price, Price::new(100.0, 500.0));
        assert_eq!(east.infrastructure.get("m5.2xlarge"), Some(&2));
        assert_eq!(east.infrastructure.get("m5.large"), Some(&1));
        assert_eq!(east.instance_count(), 3);
    }

    #[test]
    fn test_missing_or_negative_price_is_malformed() {
        let missing = doc(json!({"blueprints": [
            {"cluster_uid": "a", "blueprint": {"usd_per_month": {"cluster": 1.0}, "nodes": []}}
        ]}));
        assert!(matches!(
            to_cluster_group("g", &missing),
            Err(RemoteError::Malformed(_))
        ));

        let negative = doc(json!({"blueprints": [
            {"cluster_uid": "a", "blueprint": {"usd_per_month": {"cluster": -1.0, "storage": 0.0}}}
        ]}));
        let err = to_cluster_group("g", &negative).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("usd_per_month.cluster"));
    }

    #[test]
    fn test_empty_document_gives_empty_group() {
        let group = to_cluster_group("g", &BlueprintDocument::default()).unwrap();
        assert!(group.members.is_empty());
        assert!(extract_metadata("g", &BlueprintDocument::default()).is_none());
    }

    #[test]
    fn test_extract_aws_metadata() {
        let meta = extract_metadata("mc-1", &aws_group()).unwrap();
        assert_eq!(meta.cloud_provider.as_deref(), Some("AWS"));
        assert_eq!(meta.region.as_deref(), Some("us-east-1"));
        assert_eq!(meta.name.as_deref(), Some("orders"));
        assert_eq!(meta.engine_version.as_deref(), Some("7.2"));
        assert_eq!(meta.software_version.as_deref(), Some("7.4.2-54"));
        assert_eq!(meta.os_version.as_deref(), Some("ubuntu-22.04"));
        assert_eq!(meta.multi_az, Some(true));
        assert_eq!(meta.rof_enabled, Some(false));
        assert_eq!(meta.shards_count, Some(4));
        assert_eq!(meta.max_shards_count, Some(16));
        assert_eq!(meta.creation_date.as_deref(), Some("2024-03-09"));
        assert_eq!(
            meta.availability_zones.as_deref(),
            Some("us-east-1a,us-east-1b,us-east-1c")
        );
        assert_eq!(meta.storage_type.as_deref(), Some("gp3,io2"));
        assert_eq!(meta.total_storage_gb, Some(220));
        assert_eq!(meta.data_nodes_count, Some(2));
        assert_eq!(meta.quorum_nodes_count, Some(1));
        assert_eq!(meta.total_nodes_count, Some(3));
    }

    #[test]
    fn test_extract_gcp_metadata() {
        let gcp = doc(json!({"blueprints": [{
            "cluster_uid": "eu",
            "blueprint": {
                "usd_per_month": {"cluster": 10.0, "storage": 1.0},
                "cloud": {"provider": "gcp", "gcp": {"region": "europe-west1"}},
                "nodes": [
                    {"instance_type": "n2-standard-4",
                     "gcp_disks": [{"type": "pd-ssd", "size": 50}, {"type": "pd-balanced", "size": 25}]}
                ]
            }
        }]}));

        let meta = extract_metadata("mc-9", &gcp).unwrap();
        assert_eq!(meta.cloud_provider.as_deref(), Some("GCP"));
        assert_eq!(meta.region.as_deref(), Some("europe-west1"));
        assert_eq!(meta.storage_type.as_deref(), Some("pd-balanced,pd-ssd"));
        assert_eq!(meta.total_storage_gb, Some(75));
        assert!(meta.availability_zones.is_none());
        assert!(meta.creation_date.is_none());
        assert_eq!(meta.multi_az, Some(false));
    }
}
