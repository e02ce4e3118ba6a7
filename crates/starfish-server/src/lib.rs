//! HTTP surface and scheduler host for the Starfish inventory sync.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ConfigError, LoggingConfig, ServerConfig, StorageBackend, StorageConfig};
pub use observability::init_tracing;
pub use server::{AppState, ServerBuilder, StarfishServer, build_app, build_state, create_store};
