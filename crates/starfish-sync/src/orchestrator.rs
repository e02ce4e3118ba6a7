//! Fan-out over sites, call managers, resource types and resource ids.

use std::fmt;
use std::sync::Arc;

use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use starfish_core::{ResourceType, Site, parse_list};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{ReconciliationEngine, SiteDetailsSummary};
use crate::gateway::ResourceGateway;
use crate::registry::SiteRegistry;

/// How call managers are found for a resource pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmSource {
    /// Ask the provisioning API for each registry site's details and use the
    /// CMs listed there.
    #[default]
    SiteDetails,
    /// Use `server_names` directly without consulting the registry.
    Static,
}

/// Resource ids and fan-out limits. Lists are comma-separated strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master switch for scheduled runs. Manual triggers ignore it.
    pub enabled: bool,
    pub cm_source: CmSource,
    pub station_ids: String,
    pub huntgroup_ids: String,
    pub pickupgroup_ids: String,
    pub server_names: String,
    pub max_concurrent_requests: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cm_source: CmSource::SiteDetails,
            station_ids: "1000,1001,1002".to_string(),
            huntgroup_ids: "2000,2001,2002".to_string(),
            pickupgroup_ids: "3000,3001,3002".to_string(),
            server_names: "CM1,CM2".to_string(),
            max_concurrent_requests: 4,
        }
    }
}

impl SyncConfig {
    pub fn resource_ids(&self, resource_type: ResourceType) -> Vec<String> {
        let raw = match resource_type {
            ResourceType::Station => &self.station_ids,
            ResourceType::HuntGroup => &self.huntgroup_ids,
            ResourceType::PickupGroup => &self.pickupgroup_ids,
        };
        parse_list(raw)
    }

    pub fn server_names(&self) -> Vec<String> {
        parse_list(&self.server_names)
    }
}

/// Which orchestrator entry point produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPass {
    Resource(ResourceType),
    AllResources,
    Sites,
}

impl SyncPass {
    fn skipped_prefix(&self) -> String {
        match self {
            SyncPass::Resource(t) => format!("{} resource sync", t.label()),
            SyncPass::AllResources => "All resource sync".to_string(),
            SyncPass::Sites => "Site sync".to_string(),
        }
    }

    fn failed_prefix(&self) -> String {
        match self {
            SyncPass::Resource(t) => format!("{} resource sync failed", t.label()),
            SyncPass::AllResources => "Complete resource sync failed".to_string(),
            SyncPass::Sites => "Site sync failed".to_string(),
        }
    }

    fn skipped(&self, reason: &str) -> SyncOutcome {
        SyncOutcome::Skipped(format!("{} skipped - {reason}", self.skipped_prefix()))
    }

    fn failed(&self, message: impl fmt::Display) -> SyncOutcome {
        SyncOutcome::Failed(format!("{}: {message}", self.failed_prefix()))
    }
}

/// Outcome of one pass. The summary string is the value reported upward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(String),
    Skipped(String),
    Failed(String),
}

impl SyncOutcome {
    pub fn summary(&self) -> &str {
        match self {
            SyncOutcome::Completed(s) | SyncOutcome::Skipped(s) | SyncOutcome::Failed(s) => s,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }

    pub fn into_summary(self) -> String {
        match self {
            SyncOutcome::Completed(s) | SyncOutcome::Skipped(s) | SyncOutcome::Failed(s) => s,
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub success: u32,
    pub failed: u32,
}

/// Success/failure counts per resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceTally {
    station: Tally,
    huntgroup: Tally,
    pickupgroup: Tally,
}

impl ResourceTally {
    pub fn get(&self, resource_type: ResourceType) -> Tally {
        match resource_type {
            ResourceType::Station => self.station,
            ResourceType::HuntGroup => self.huntgroup,
            ResourceType::PickupGroup => self.pickupgroup,
        }
    }

    fn get_mut(&mut self, resource_type: ResourceType) -> &mut Tally {
        match resource_type {
            ResourceType::Station => &mut self.station,
            ResourceType::HuntGroup => &mut self.huntgroup,
            ResourceType::PickupGroup => &mut self.pickupgroup,
        }
    }

    fn merge(&mut self, other: &ResourceTally) {
        for resource_type in ResourceType::ALL {
            let theirs = other.get(resource_type);
            let ours = self.get_mut(resource_type);
            ours.success += theirs.success;
            ours.failed += theirs.failed;
        }
    }
}

fn single_type_summary(resource_type: ResourceType, tally: &ResourceTally) -> String {
    let t = tally.get(resource_type);
    format!(
        "{} resource sync completed. Success: {}, Failed: {}",
        resource_type.label(),
        t.success,
        t.failed
    )
}

fn all_types_summary(tally: &ResourceTally) -> String {
    let parts: Vec<String> = ResourceType::ALL
        .iter()
        .map(|t| {
            let counts = tally.get(*t);
            format!(
                "{} (Success: {}, Failed: {})",
                t.short_label(),
                counts.success,
                counts.failed
            )
        })
        .collect();
    format!("All resources sync completed. {}", parts.join(", "))
}

fn sites_summary(summary: &SiteDetailsSummary) -> String {
    format!(
        "Site sync completed. Results: {}, Skipped: {}, Ranges (Updated: {}, Inserted: {}), Reservations (Updated: {}, Inserted: {})",
        summary.results,
        summary.skipped,
        summary.ranges.updated,
        summary.ranges.inserted,
        summary.reservations.updated,
        summary.reservations.inserted
    )
}

/// Drives site reconciliation and resource fan-out.
///
/// Site passes and resource passes are guarded separately: a pass started
/// while another pass of the same kind is running returns a skipped outcome
/// immediately, while passes of different kinds may overlap.
pub struct SyncOrchestrator {
    registry: Arc<dyn SiteRegistry>,
    gateway: Arc<dyn ResourceGateway>,
    engine: ReconciliationEngine,
    config: SyncConfig,
    sites_lock: Mutex<()>,
    resources_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<dyn SiteRegistry>,
        gateway: Arc<dyn ResourceGateway>,
        engine: ReconciliationEngine,
        config: SyncConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            engine,
            config,
            sites_lock: Mutex::new(()),
            resources_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn ResourceGateway> {
        &self.gateway
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Fetches one resource type for every resolved CM.
    #[instrument(skip(self))]
    pub async fn sync_resource_type(&self, resource_type: ResourceType) -> SyncOutcome {
        let pass = SyncPass::Resource(resource_type);
        let Ok(_guard) = self.resources_lock.try_lock() else {
            return pass.skipped("Another sync is in progress");
        };
        info!("Starting {} resource synchronization", resource_type.label());

        let outcome = self.run_resources(pass, &[resource_type], false).await;
        log_outcome(&outcome);
        outcome
    }

    /// Reconciles site details and fetches every resource type for every CM.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> SyncOutcome {
        let pass = SyncPass::AllResources;
        let Ok(_guard) = self.resources_lock.try_lock() else {
            return pass.skipped("Another sync is in progress");
        };
        info!("Starting complete resource synchronization for all resource types");

        let outcome = self.run_resources(pass, &ResourceType::ALL, true).await;
        log_outcome(&outcome);
        outcome
    }

    /// Reconciles site details for every registry site without touching resources.
    #[instrument(skip(self))]
    pub async fn sync_sites(&self) -> SyncOutcome {
        let pass = SyncPass::Sites;
        let Ok(_guard) = self.sites_lock.try_lock() else {
            return pass.skipped("Another sync is in progress");
        };
        info!("Starting site synchronization");

        let outcome = match self.fetch_sites(pass).await {
            Ok(sites) => self.reconcile_sites(pass, &sites).await,
            Err(outcome) => outcome,
        };
        log_outcome(&outcome);
        outcome
    }

    async fn reconcile_sites(&self, pass: SyncPass, sites: &[Site]) -> SyncOutcome {
        let mut total = SiteDetailsSummary::default();
        for site in sites {
            let payloads = self.gateway.fetch_site_details(&site.site_name).await;
            if payloads.is_empty() {
                warn!(site = %site.site_name, "No site details for site");
                continue;
            }
            match self.engine.apply_site_details(&payloads).await {
                Ok(summary) => total.merge(&summary),
                Err(e) => return pass.failed(e),
            }
        }
        SyncOutcome::Completed(sites_summary(&total))
    }

    async fn fetch_sites(&self, pass: SyncPass) -> Result<Vec<Site>, SyncOutcome> {
        match self.registry.list_sites().await {
            Ok(sites) if sites.is_empty() => {
                warn!("No sites found in the site registry");
                Err(pass.skipped("No sites available"))
            }
            Ok(sites) => {
                info!(count = sites.len(), "Found sites");
                Ok(sites)
            }
            Err(e) => Err(pass.failed(e)),
        }
    }

    async fn run_resources(
        &self,
        pass: SyncPass,
        types: &[ResourceType],
        reconcile: bool,
    ) -> SyncOutcome {
        let mut tally = ResourceTally::default();

        match self.config.cm_source {
            CmSource::Static => {
                let servers = self.config.server_names();
                if servers.is_empty() {
                    return pass.skipped("No servers configured");
                }
                for cm in &servers {
                    tally.merge(&self.fan_out(cm, types).await);
                }
            }
            CmSource::SiteDetails => {
                let sites = match self.fetch_sites(pass).await {
                    Ok(sites) => sites,
                    Err(outcome) => return outcome,
                };
                for site in &sites {
                    let payloads = self.gateway.fetch_site_details(&site.site_name).await;
                    if payloads.is_empty() {
                        warn!(site = %site.site_name, "No site details for site");
                        continue;
                    }
                    if reconcile && let Err(e) = self.engine.apply_site_details(&payloads).await {
                        return pass.failed(e);
                    }

                    let mut cms: Vec<&str> = Vec::new();
                    for cm in payloads.iter().flat_map(|p| p.cm_names()) {
                        if !cms.contains(&cm) {
                            cms.push(cm);
                        }
                    }
                    for cm in cms {
                        debug!(site = %site.site_name, cm, "Found CM for site");
                        tally.merge(&self.fan_out(cm, types).await);
                    }
                }
            }
        }

        match pass {
            SyncPass::Resource(resource_type) => {
                SyncOutcome::Completed(single_type_summary(resource_type, &tally))
            }
            _ => SyncOutcome::Completed(all_types_summary(&tally)),
        }
    }

    /// Fetches every configured id of every type on one CM, with at most
    /// `max_concurrent_requests` calls in flight.
    async fn fan_out(&self, cm: &str, types: &[ResourceType]) -> ResourceTally {
        let jobs: Vec<(ResourceType, String)> = types
            .iter()
            .flat_map(|t| {
                self.config
                    .resource_ids(*t)
                    .into_iter()
                    .map(move |id| (*t, id))
            })
            .collect();

        let gateway = &self.gateway;
        let limit = self.config.max_concurrent_requests.max(1);
        let results: Vec<_> = stream::iter(jobs)
            .map(|(resource_type, resource_id)| async move {
                gateway
                    .fetch_resource(resource_type, &resource_id, cm)
                    .await
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut tally = ResourceTally::default();
        for result in results {
            let meta = result.meta();
            let counts = tally.get_mut(meta.resource_type);
            if result.is_success() {
                counts.success += 1;
                debug!(
                    resource_type = %meta.resource_type,
                    resource_id = %meta.resource_id,
                    cm,
                    "Synced resource"
                );
            } else {
                counts.failed += 1;
                warn!(
                    resource_type = %meta.resource_type,
                    resource_id = %meta.resource_id,
                    cm,
                    message = result.message().unwrap_or_default(),
                    "Failed to sync resource"
                );
            }
        }
        tally
    }
}

fn log_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed(summary) => info!("{summary}"),
        SyncOutcome::Skipped(summary) => warn!("{summary}"),
        SyncOutcome::Failed(summary) => error!("{summary}"),
    }
}
