//! Authenticated client for the remote provisioning API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use starfish_core::{
    ResourceErrorKind, ResourceMeta, ResourceResult, ResourceType, SiteDetailsPayload,
};
use tracing::{debug, warn};

/// Connection settings for the provisioning API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteApiConfig {
    /// Base URL up to and including the API version segment.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout_ms: u64,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/ProvisioningWebService/sps/v1".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Fetches site details and individual resources from the provisioning API.
///
/// Implementations never fail: resource fetches come back as
/// [`ResourceResult::Error`], site-detail failures as an empty list.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn fetch_site_details(&self, cluster_name: &str) -> Vec<SiteDetailsPayload>;

    async fn fetch_resource(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        server_name: &str,
    ) -> ResourceResult;
}

pub struct HttpResourceGateway {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpResourceGateway {
    pub fn new(config: &RemoteApiConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
    }

    fn resource_url(&self, resource_type: ResourceType, resource_id: &str) -> String {
        format!(
            "{}/resource/{}/{}",
            self.base_url,
            resource_type.as_str(),
            urlencoding::encode(resource_id)
        )
    }
}

#[async_trait]
impl ResourceGateway for HttpResourceGateway {
    async fn fetch_site_details(&self, cluster_name: &str) -> Vec<SiteDetailsPayload> {
        let url = format!("{}/site", self.base_url);
        debug!(site = %cluster_name, url = %url, "Fetching site details");

        let response = match self
            .get(&url)
            .query(&[("SiteName", cluster_name)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(site = %cluster_name, error = %e, "Site details request failed");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(site = %cluster_name, status = %status, "Site details returned non-success status");
            return Vec::new();
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(site = %cluster_name, error = %e, "Site details body is not JSON");
                return Vec::new();
            }
        };

        match SiteDetailsPayload::from_value(body) {
            Ok(payload) => {
                debug!(site = %cluster_name, results = payload.results.len(), "Fetched site details");
                vec![payload]
            }
            Err(e) => {
                warn!(site = %cluster_name, error = %e, "Site details payload rejected");
                Vec::new()
            }
        }
    }

    async fn fetch_resource(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        server_name: &str,
    ) -> ResourceResult {
        let url = self.resource_url(resource_type, resource_id);
        let meta = || ResourceMeta::new(resource_type, resource_id, server_name);
        debug!(
            resource_type = %resource_type,
            resource_id = %resource_id,
            cm = %server_name,
            url = %url,
            "Fetching resource"
        );

        let response = match self
            .get(&url)
            .query(&[("ServerName", server_name)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return ResourceResult::error(meta(), ResourceErrorKind::Transport, e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ResourceResult::error(
                meta(),
                ResourceErrorKind::Status,
                format!("API returned status: {status}"),
            );
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return ResourceResult::error(meta(), ResourceErrorKind::Transport, e.to_string());
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return ResourceResult::error(
                meta(),
                ResourceErrorKind::EmptyBody,
                "API returned an empty body",
            );
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(body)) => ResourceResult::success(meta(), body),
            Ok(Value::Null) => ResourceResult::error(
                meta(),
                ResourceErrorKind::EmptyBody,
                "API returned an empty body",
            ),
            Ok(_) => ResourceResult::error(
                meta(),
                ResourceErrorKind::Decode,
                "API returned a body that is not a JSON object",
            ),
            Err(e) => ResourceResult::error(
                meta(),
                ResourceErrorKind::Decode,
                format!("Failed to decode response body: {e}"),
            ),
        }
    }
}
