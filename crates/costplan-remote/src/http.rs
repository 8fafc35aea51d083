//! [`ClusterApi`] over the service's REST endpoints.

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use costplan_core::{Error, RemoteSettings, Result};

use crate::api::ClusterApi;
use crate::dto::{BlueprintDocument, GroupListing, OptimalPlanResponse, StatusResponse};
use crate::error::RemoteError;

const API_PREFIX: [&str; 3] = ["api", "v1", "multi-clusters"];

/// Basic-auth HTTPS client. One attempt per call.
pub struct HttpClusterApi {
    http: HttpClient,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpClusterApi {
    pub fn new(settings: &RemoteSettings) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(settings.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&settings.server)
            .map_err(|e| Error::Config(format!("Invalid REMOTE_SERVER {}: {}", settings.server, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Invalid REMOTE_SERVER {}: not a base URL",
                settings.server
            )));
        }

        Ok(Self {
            http,
            base_url,
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    /// Endpoint under the API prefix. Each segment is percent-encoded, so a
    /// group id can never add path levels.
    fn url(&self, segments: &[&str]) -> std::result::Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::NonTransient {
                status: 0,
                message: format!("{} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, RemoteError> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status.as_u16(), body));
        }

        // A body cut short is a transport failure; only the JSON step below
        // can make a response malformed.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Transient(format!("reading response body: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn list_groups(&self) -> std::result::Result<Vec<GroupListing>, RemoteError> {
        let url = self.url(&[])?;
        debug!("GET {}", url);
        self.send(self.http.get(url)).await
    }

    async fn group_status(&self, group_id: &str) -> std::result::Result<String, RemoteError> {
        let url = self.url(&[group_id, "status"])?;
        debug!("GET {}", url);
        let status: StatusResponse = self.send(self.http.get(url)).await?;
        Ok(status.status)
    }

    async fn current_blueprint(&self, group_id: &str) -> std::result::Result<BlueprintDocument, RemoteError> {
        let url = self.url(&[group_id, "blueprint"])?;
        debug!("GET {}", url);
        self.send(self.http.get(url)).await
    }

    async fn optimal_plan(&self, group_id: &str) -> std::result::Result<BlueprintDocument, RemoteError> {
        let url = self.url(&[group_id, "optimal-plan"])?;
        debug!("POST {}", url);
        let request = self
            .http
            .post(url)
            .query(&[("fetch_db_specs", "true")])
            .json(&serde_json::json!({}));
        let plan: OptimalPlanResponse = self.send(request).await?;
        Ok(plan.result)
    }
}
