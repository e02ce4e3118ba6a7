//! Authoritative list of sites to reconcile.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use starfish_core::Site;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    #[default]
    Http,
    Static,
}

/// Where the site list comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub mode: RegistryMode,
    /// Base URL of the registry service; `/sites` is appended.
    pub url: Option<String>,
    /// Site names used when `mode = "static"`.
    pub sites: Vec<String>,
    pub request_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mode: RegistryMode::Http,
            url: None,
            sites: Vec::new(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Site registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Site registry returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Site registry is not configured: {0}")]
    Config(String),
}

#[async_trait]
pub trait SiteRegistry: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<Site>, RegistryError>;
}

/// Registry service answering `GET {url}/sites` with `[{"siteName": ...}]`.
pub struct HttpSiteRegistry {
    http: reqwest::Client,
    sites_url: String,
}

impl HttpSiteRegistry {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            sites_url: format!("{}/sites", url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl SiteRegistry for HttpSiteRegistry {
    async fn list_sites(&self) -> Result<Vec<Site>, RegistryError> {
        let response = self
            .http
            .get(&self.sites_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status));
        }

        let sites: Vec<Site> = response.json().await?;
        let sites: Vec<Site> = sites
            .into_iter()
            .filter(|s| !s.site_name.trim().is_empty())
            .collect();
        debug!(count = sites.len(), "Fetched sites from registry");
        Ok(sites)
    }
}

/// Fixed site list from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSiteRegistry {
    sites: Vec<Site>,
}

impl StaticSiteRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sites = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(Site::new)
            .collect();
        Self { sites }
    }
}

#[async_trait]
impl SiteRegistry for StaticSiteRegistry {
    async fn list_sites(&self) -> Result<Vec<Site>, RegistryError> {
        Ok(self.sites.clone())
    }
}

/// Builds the registry selected by `config.mode`.
pub fn build_registry(config: &RegistryConfig) -> Result<Arc<dyn SiteRegistry>, RegistryError> {
    match config.mode {
        RegistryMode::Static => Ok(Arc::new(StaticSiteRegistry::new(config.sites.clone()))),
        RegistryMode::Http => {
            let url = config
                .url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| RegistryError::Config("registry.url is required".into()))?;
            Ok(Arc::new(HttpSiteRegistry::new(
                url,
                Duration::from_millis(config.request_timeout_ms),
            )?))
        }
    }
}
