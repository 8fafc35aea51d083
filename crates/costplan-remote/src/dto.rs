//! Wire types of the planning service.
//!
//! Only the fields the engine reads are modelled; everything else in the
//! service's documents is ignored on decode.

use serde::{Deserialize, Serialize};

/// One entry of the group listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupListing {
    pub multi_cluster_uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl GroupListing {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            multi_cluster_uid: uid.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimalPlanResponse {
    pub result: BlueprintDocument,
}

/// Blueprint of a whole group: one entry per member cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlueprintDocument {
    #[serde(default)]
    pub blueprints: Vec<MemberBlueprint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberBlueprint {
    pub cluster_uid: String,
    pub blueprint: Blueprint,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default)]
    pub usd_per_month: Option<MonthlyCost>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub cloud: CloudSpec,
    #[serde(default)]
    pub cluster: ClusterSpec,
    #[serde(default)]
    pub metadata: BlueprintMetadata,
}

/// Monthly USD cost split. `cluster` is the instance cost.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlyCost {
    pub cluster: Option<f64>,
    pub storage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    pub instance_type: String,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub quorum_only: bool,
    #[serde(default)]
    pub ebs_volume: Option<EbsVolume>,
    #[serde(default)]
    pub gcp_disks: Vec<Disk>,
    #[serde(default)]
    pub azure_disks: Vec<Disk>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EbsVolume {
    pub volume_type: Option<String>,
    pub volume_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Disk {
    #[serde(rename = "type")]
    pub disk_type: Option<String>,
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CloudSpec {
    pub provider: Option<String>,
    /// AWS keeps the region at this level.
    pub region: Option<String>,
    pub account_id: Option<String>,
    pub gcp: Option<RegionSpec>,
    pub azure: Option<RegionSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionSpec {
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: Option<String>,
    pub redis_version: Option<String>,
    pub multi_az: Option<bool>,
    pub shards_count: Option<i64>,
    pub max_shards_count: Option<i64>,
    pub desired_os_version: Option<String>,
    pub desired_software_version: Option<String>,
    pub rof: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlueprintMetadata {
    pub creation_time: Option<String>,
}
