//! The planning service as a capability.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dto::{BlueprintDocument, GroupListing};
use crate::error::RemoteError;

/// Raw, single-attempt access to the planning service. Retries and rate
/// limiting live in [`crate::RemoteClient`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Every group visible to the account, in service order.
    async fn list_groups(&self) -> Result<Vec<GroupListing>, RemoteError>;

    /// Deployment status string, `done` when the group is live.
    async fn group_status(&self, group_id: &str) -> Result<String, RemoteError>;

    async fn current_blueprint(&self, group_id: &str) -> Result<BlueprintDocument, RemoteError>;

    /// Cost-optimal blueprint computed by the service.
    async fn optimal_plan(&self, group_id: &str) -> Result<BlueprintDocument, RemoteError>;
}

#[async_trait]
impl<T: ClusterApi + ?Sized> ClusterApi for Arc<T> {
    async fn list_groups(&self) -> Result<Vec<GroupListing>, RemoteError> {
        (**self).list_groups().await
    }

    async fn group_status(&self, group_id: &str) -> Result<String, RemoteError> {
        (**self).group_status(group_id).await
    }

    async fn current_blueprint(&self, group_id: &str) -> Result<BlueprintDocument, RemoteError> {
        (**self).current_blueprint(group_id).await
    }

    async fn optimal_plan(&self, group_id: &str) -> Result<BlueprintDocument, RemoteError> {
        (**self).optimal_plan(group_id).await
    }
}
