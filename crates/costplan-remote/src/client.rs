//! Rate-limited, retrying facade over a [`ClusterApi`].

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, info};

use costplan_core::{ClusterGroup, ClusterMetadata, RemoteSettings, Result};

use crate::api::ClusterApi;
use crate::convert::{extract_metadata, to_cluster_group};
use crate::dto::BlueprintDocument;
use crate::error::RemoteError;
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;

/// Status string of a fully deployed group.
pub const ACTIVE_STATUS: &str = "done";

/// A group's current blueprint with its metadata already extracted.
/// Metadata does not depend on pricing, so it is available even when the
/// blueprint cannot be normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedGroup {
    pub group_id: String,
    pub metadata: Option<ClusterMetadata>,
    pub document: BlueprintDocument,
}

impl FetchedGroup {
    fn new(group_id: &str, document: BlueprintDocument) -> Self {
        Self {
            group_id: group_id.to_string(),
            metadata: extract_metadata(group_id, &document),
            document,
        }
    }

    /// Normalize the current blueprint. Fails with `Malformed` on missing or
    /// invalid prices.
    pub fn group(&self) -> std::result::Result<ClusterGroup, RemoteError> {
        let group = to_cluster_group(&self.group_id, &self.document)?;
        debug!("{}: {} current member(s)", self.group_id, group.members.len());
        Ok(group)
    }
}

/// The only caller of the planning service. Each logical call goes through
/// the retry policy, and each attempt waits on the shared rate limiter.
pub struct RemoteClient<A> {
    api: A,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl<A: ClusterApi> RemoteClient<A> {
    pub fn new(api: A, limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            api,
            limiter,
            retry,
        }
    }

    pub fn from_settings(api: A, settings: &RemoteSettings) -> Result<Self> {
        Ok(Self::new(
            api,
            RateLimiter::new(settings.calls_per_second)?,
            RetryPolicy::new(settings.max_retries, settings.retry_delay),
        ))
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Group ids to process, in service order. Excluded and repeated ids are
    /// dropped before `limit` applies; a limit of 0 means no limit.
    pub async fn list_cluster_groups(
        &self,
        limit: Option<usize>,
        exclude: &BTreeSet<String>,
    ) -> std::result::Result<Vec<String>, RemoteError> {
        let listings = self
            .retry
            .run(&self.limiter, "list groups", || self.api.list_groups())
            .await?;
        let listed = listings.len();

        let mut seen = HashSet::new();
        let mut ids: Vec<String> = listings
            .into_iter()
            .map(|l| l.multi_cluster_uid)
            .filter(|id| !exclude.contains(id))
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if let Some(limit) = limit.filter(|&l| l > 0) {
            ids.truncate(limit);
        }

        info!(
            "Listed {} groups, {} selected ({} excluded)",
            listed,
            ids.len(),
            exclude.len()
        );
        Ok(ids)
    }

    /// Raw deployment status of a group.
    pub async fn group_status(&self, group_id: &str) -> std::result::Result<String, RemoteError> {
        self.retry
            .run(&self.limiter, "group status", || self.api.group_status(group_id))
            .await
    }

    /// Whether the group is fully deployed.
    pub async fn is_active(&self, group_id: &str) -> std::result::Result<bool, RemoteError> {
        Ok(self.group_status(group_id).await? == ACTIVE_STATUS)
    }

    /// Current blueprint plus the group's metadata. Normalization is left to
    /// [`FetchedGroup::group`].
    pub async fn fetch_current(&self, group_id: &str) -> std::result::Result<FetchedGroup, RemoteError> {
        let doc = self
            .retry
            .run(&self.limiter, "current blueprint", || {
                self.api.current_blueprint(group_id)
            })
            .await?;
        Ok(FetchedGroup::new(group_id, doc))
    }

    /// Cost-optimal plan, normalized.
    pub async fn fetch_optimal(&self, group_id: &str) -> std::result::Result<ClusterGroup, RemoteError> {
        let doc = self
            .retry
            .run(&self.limiter, "optimal plan", || self.api.optimal_plan(group_id))
            .await?;

        let group = to_cluster_group(group_id, &doc)?;
        debug!("{}: {} optimal member(s)", group_id, group.members.len());
        Ok(group)
    }
}
