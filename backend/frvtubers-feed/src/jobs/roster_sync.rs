//! Team Roster Sync Background Job
//!
//! Periodically fetches the Twitch team roster and hands it to the registry,
//! which recomputes every team flag and publishes a new snapshot.
//!
//! Scheduling:
//! - first refresh runs immediately at startup
//! - success: next refresh after the configured interval (default 1h)
//! - failure or no data: retry after the short retry interval (10 min)
//! - a refresh requested while one is running is skipped and re-scheduled
//!   at the standard interval
//!
//! Without Twitch credentials the job logs once and exits; the roster bundled
//! with the catalog stays authoritative for the process lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::config::RosterConfig;
use crate::metrics;
use crate::registry::VtuberRegistry;
use crate::services::RosterSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { members: usize },
    NoData,
    Failed,
    Skipped,
}

impl RefreshOutcome {
    fn status(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated { .. } => "success",
            RefreshOutcome::NoData => "empty",
            RefreshOutcome::Failed => "error",
            RefreshOutcome::Skipped => "skipped",
        }
    }
}

pub struct RosterSyncJob {
    registry: Arc<VtuberRegistry>,
    source: Arc<dyn RosterSource>,
    refresh_interval: Duration,
    retry_interval: Duration,
    running: AtomicBool,
}

impl RosterSyncJob {
    pub fn new(
        registry: Arc<VtuberRegistry>,
        source: Arc<dyn RosterSource>,
        config: &RosterConfig,
    ) -> Self {
        Self {
            registry,
            source,
            refresh_interval: config.refresh_interval,
            retry_interval: config.retry_interval,
            running: AtomicBool::new(false),
        }
    }

    /// Runs one refresh unless another one is in progress
    pub async fn refresh_once(&self) -> RefreshOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Roster refresh already in progress, skipping");
            metrics::record_roster_refresh(RefreshOutcome::Skipped.status());
            return RefreshOutcome::Skipped;
        }

        let outcome = self.fetch_and_apply().await;
        self.running.store(false, Ordering::Release);

        metrics::record_roster_refresh(outcome.status());
        outcome
    }

    async fn fetch_and_apply(&self) -> RefreshOutcome {
        let started = Instant::now();

        match self.source.fetch_roster().await {
            Ok(Some(snapshot)) => {
                let members = snapshot.members.len();
                self.registry
                    .refresh_roster(snapshot.members, snapshot.generated_at);
                metrics::set_roster_members(members);
                tracing::info!(
                    members,
                    duration_ms = started.elapsed().as_millis(),
                    "Updated Twitch team roster"
                );
                RefreshOutcome::Updated { members }
            }
            Ok(None) => {
                tracing::warn!("Twitch team roster unavailable, keeping previous roster");
                RefreshOutcome::NoData
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    duration_ms = started.elapsed().as_millis(),
                    "Failed to refresh team roster"
                );
                RefreshOutcome::Failed
            }
        }
    }

    /// Delay before the refresh following `outcome`
    pub fn next_delay(&self, outcome: RefreshOutcome) -> Duration {
        match outcome {
            RefreshOutcome::Updated { .. } | RefreshOutcome::Skipped => self.refresh_interval,
            RefreshOutcome::NoData | RefreshOutcome::Failed => self.retry_interval,
        }
    }

    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            interval_secs = self.refresh_interval.as_secs(),
            retry_secs = self.retry_interval.as_secs(),
            "Starting team roster sync background job"
        );

        loop {
            let outcome = self.refresh_once().await;
            sleep(self.next_delay(outcome)).await;
        }
    }
}

/// Spawns the sync job, or logs once and returns when no source is configured
pub fn start_roster_sync(
    registry: Arc<VtuberRegistry>,
    source: Option<Arc<dyn RosterSource>>,
    config: &RosterConfig,
) -> Option<tokio::task::JoinHandle<()>> {
    let Some(source) = source else {
        tracing::warn!(
            "Missing TWITCH_CLIENT_ID or TWITCH_CLIENT_SECRET environment variables. Team sync disabled."
        );
        metrics::set_roster_members(registry.team_members().len());
        return None;
    };

    let job = Arc::new(RosterSyncJob::new(registry, source, config));
    Some(tokio::spawn(job.run()))
}
