//! Inventory reconciliation and resource synchronization.
//!
//! - [`gateway`]: authenticated client for the provisioning API
//! - [`registry`]: authoritative site list
//! - [`engine`]: maps site-details payloads onto inventory rows
//! - [`orchestrator`]: site → CM → resource type → resource id fan-out
//! - [`scheduler`]: periodic site and resource passes

pub mod engine;
pub mod gateway;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;

pub use engine::{
    EngineError, ReconciliationEngine, ReconciliationSummary, SiteDetailsSummary, UpsertCounts,
};
pub use gateway::{GatewayError, HttpResourceGateway, RemoteApiConfig, ResourceGateway};
pub use orchestrator::{
    CmSource, ResourceTally, SyncConfig, SyncOrchestrator, SyncOutcome, SyncPass, Tally,
};
pub use registry::{
    HttpSiteRegistry, RegistryConfig, RegistryError, RegistryMode, SiteRegistry,
    StaticSiteRegistry, build_registry,
};
pub use scheduler::{JobSchedule, ScheduleConfig, SyncJob, SyncScheduler};
