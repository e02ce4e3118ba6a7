use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use starfish_db_postgres::PostgresConfig;
use starfish_sync::{RegistryConfig, RegistryMode, RemoteApiConfig, ScheduleConfig, SyncConfig};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Provisioning API the gateway talks to.
    #[serde(default)]
    pub remote: RemoteApiConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[source] config::ConfigError),

    #[error("config deserialize error: {0}")]
    Deserialize(#[source] config::ConfigError),

    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl AppConfig {
    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port must be > 0"));
        }
        if !self.server.api_prefix.starts_with('/') {
            return Err(ConfigError::invalid("server.api_prefix must start with '/'"));
        }

        if self.storage.backend == StorageBackend::Postgres {
            if self.storage.postgres.url.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "storage.postgres.url is required when storage.backend = \"postgres\"",
                ));
            }
            if self.storage.postgres.pool_size == 0 {
                return Err(ConfigError::invalid("storage.postgres.pool_size must be > 0"));
            }
        }

        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::invalid("remote.base_url must not be empty"));
        }
        if self.remote.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("remote.request_timeout_ms must be > 0"));
        }

        if self.registry.mode == RegistryMode::Http
            && self.registry.url.as_deref().unwrap_or("").trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "registry.url is required when registry.mode = \"http\"",
            ));
        }

        if self.sync.max_concurrent_requests == 0 {
            return Err(ConfigError::invalid("sync.max_concurrent_requests must be > 0"));
        }
        for (name, job) in [
            ("sites", &self.schedule.sites),
            ("resources", &self.schedule.resources),
        ] {
            if job.enabled && job.interval_secs == 0 {
                return Err(ConfigError::invalid(format!(
                    "schedule.{name}.interval_secs must be > 0"
                )));
            }
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefix for the resource lookup routes.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_api_prefix() -> String {
    "/ProvisioningWebService/sps/v1".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "starfish.toml";

    /// Loads `path` (or `starfish.toml`) if it exists, then applies
    /// `STARFISH__SECTION__KEY` environment overrides and validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        let mut builder = Config::builder();
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // e.g. STARFISH__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("STARFISH")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder.build().map_err(ConfigError::Build)?;
        let merged: AppConfig = cfg.try_deserialize().map_err(ConfigError::Deserialize)?;
        merged.validate()?;
        Ok(merged)
    }
}
