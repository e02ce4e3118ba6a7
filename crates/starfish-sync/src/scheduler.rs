use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::orchestrator::{SyncOrchestrator, SyncOutcome};

const DAY_SECS: u64 = 24 * 60 * 60;

/// Timing for one periodic job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSchedule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub initial_delay_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DAY_SECS
}

impl JobSchedule {
    pub fn every(interval_secs: u64) -> Self {
        Self {
            enabled: true,
            interval_secs,
            initial_delay_secs: 0,
        }
    }

    #[must_use]
    pub fn with_initial_delay_secs(mut self, secs: u64) -> Self {
        self.initial_delay_secs = secs;
        self
    }
}

/// The site pass starts first; the resource pass follows after its delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub sites: JobSchedule,
    pub resources: JobSchedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sites: JobSchedule::every(DAY_SECS),
            resources: JobSchedule::every(DAY_SECS).with_initial_delay_secs(180),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncJob {
    Sites,
    Resources,
}

impl SyncJob {
    async fn run(&self, orchestrator: &SyncOrchestrator) -> SyncOutcome {
        match self {
            SyncJob::Sites => orchestrator.sync_sites().await,
            SyncJob::Resources => orchestrator.sync_all().await,
        }
    }
}

impl fmt::Display for SyncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncJob::Sites => write!(f, "site sync"),
            SyncJob::Resources => write!(f, "resource sync"),
        }
    }
}

/// Runs each enabled job on its own task until shut down.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    config: ScheduleConfig,
    cancel: CancellationToken,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: ScheduleConfig) -> Self {
        Self {
            orchestrator,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawns the enabled jobs. Nothing is spawned when the sync is disabled.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        if !self.orchestrator.config().enabled {
            info!("Scheduled sync is disabled");
            return Vec::new();
        }

        [
            (SyncJob::Sites, &self.config.sites),
            (SyncJob::Resources, &self.config.resources),
        ]
        .into_iter()
        .filter_map(|(job, schedule)| {
            if !schedule.enabled {
                info!(job = %job, "Scheduled job is disabled");
                return None;
            }
            Some(tokio::spawn(run_job(
                self.orchestrator.clone(),
                job,
                schedule.clone(),
                self.cancel.clone(),
            )))
        })
        .collect()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run_job(
    orchestrator: Arc<SyncOrchestrator>,
    job: SyncJob,
    schedule: JobSchedule,
    cancel: CancellationToken,
) {
    info!(
        job = %job,
        interval_secs = schedule.interval_secs,
        initial_delay_secs = schedule.initial_delay_secs,
        "Scheduled job registered"
    );

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sleep(Duration::from_secs(schedule.initial_delay_secs)) => {}
    }

    let mut ticker = interval(Duration::from_secs(schedule.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        info!(job = %job, "Starting scheduled job");
        let outcome = job.run(&orchestrator).await;
        info!(job = %job, result = %outcome, "Completed scheduled job");
    }

    debug!(job = %job, "Scheduled job stopped");
}
