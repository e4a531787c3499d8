//! Background Jobs
//!
//! Periodic recomputation of every trending leaderboard, plus pruning of
//! metric events past the retention window.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::services::{TrendingError, TrendingService};

/// Configuration for the trending recompute job
#[derive(Debug, Clone)]
pub struct TrendingJobConfig {
    /// Interval between recompute runs (default: 1 hour)
    pub interval: Duration,
    /// Whether the job is enabled
    pub enabled: bool,
}

impl Default for TrendingJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            enabled: true,
        }
    }
}

/// Background job runner for trending recomputation
pub struct TrendingJob {
    service: TrendingService,
    config: TrendingJobConfig,
}

impl TrendingJob {
    pub fn new(service: TrendingService, config: TrendingJobConfig) -> Self {
        Self { service, config }
    }

    /// Start the recompute job
    ///
    /// Returns a shutdown sender that can be used to stop the job.
    pub fn start(self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        if !self.config.enabled {
            info!("Trending recompute job is disabled");
            return shutdown_tx;
        }

        let service = self.service;
        let interval = self.config.interval;

        tokio::spawn(async move {
            info!("Starting trending recompute job with interval {:?}", interval);

            // Run immediately on startup
            if let Err(e) = run_trending_recompute(&service).await {
                error!("Initial trending recompute failed: {}", e);
            }

            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        if let Err(e) = run_trending_recompute(&service).await {
                            error!("Trending recompute failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Trending recompute job shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

/// Run a single recompute cycle: refresh every leaderboard, then prune.
///
/// A failed prune is logged but does not fail the cycle, since the new
/// leaderboards are already installed by then.
pub async fn run_trending_recompute(service: &TrendingService) -> Result<(), TrendingError> {
    let computed_at = service.recalculate().await?;

    if let Err(e) = service.prune_expired(computed_at).await {
        error!("Metric event pruning failed: {}", e);
    }

    info!(
        "Trending recompute cycle finished in {} ms",
        (Utc::now() - computed_at).num_milliseconds()
    );
    Ok(())
}
