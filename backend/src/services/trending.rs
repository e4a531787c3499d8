//! Trending Service
//!
//! Discovery of popular widgets from recent download, rating and comment
//! activity. Leaderboards are computed from a snapshot of metric events and
//! the item catalog, cached per period, and served truncated to the
//! requested limit.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{
    FeaturedItem, Item, PeriodScore, TrendingEntry, TrendingPeriod, TrendingResponse,
    DEFAULT_LIMIT, MAX_LIMIT,
};
use crate::services::catalog::ItemCatalog;
use crate::services::leaderboard_cache::{Leaderboard, LeaderboardCache};
use crate::services::metric_store::{MetricSnapshotStore, SourceError};
use crate::services::ranking::Ranker;

/// Events are kept for the longest period plus its comparison window
pub const EVENT_RETENTION_DAYS: i64 = 60;

/// Errors that can occur during trending operations
#[derive(Debug, Clone, Error)]
pub enum TrendingError {
    #[error("{0}")]
    InvalidPeriod(String),

    #[error("Invalid limit: {0}. Limit must be between 1 and {}", MAX_LIMIT)]
    InvalidLimit(String),

    #[error(transparent)]
    Upstream(#[from] SourceError),
}

/// Service for trending widget discovery
#[derive(Clone)]
pub struct TrendingService {
    catalog: Arc<dyn ItemCatalog>,
    metrics: MetricSnapshotStore,
    ranker: Ranker,
    cache: Arc<LeaderboardCache>,
}

impl TrendingService {
    pub fn new(
        catalog: Arc<dyn ItemCatalog>,
        metrics: MetricSnapshotStore,
        ranker: Ranker,
        cache: Arc<LeaderboardCache>,
    ) -> Self {
        Self {
            catalog,
            metrics,
            ranker,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<LeaderboardCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricSnapshotStore {
        &self.metrics
    }

    /// Parse the `period` query parameter; absent means the 7-day period
    pub fn parse_period(raw: Option<&str>) -> Result<TrendingPeriod, TrendingError> {
        match raw {
            None => Ok(TrendingPeriod::default()),
            Some(raw) => raw.parse().map_err(TrendingError::InvalidPeriod),
        }
    }

    /// Parse the `limit` query parameter; absent means `DEFAULT_LIMIT`.
    /// Values outside `[1, MAX_LIMIT]` are rejected, not clamped.
    pub fn parse_limit(raw: Option<&str>) -> Result<usize, TrendingError> {
        let limit = match raw {
            None => DEFAULT_LIMIT,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| TrendingError::InvalidLimit(raw.trim().to_string()))?,
        };

        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(TrendingError::InvalidLimit(limit.to_string()));
        }
        // Bounded by MAX_LIMIT above
        Ok(limit as usize)
    }

    /// Get the leaderboard for `period`, truncated to `limit`.
    ///
    /// Serves a fresh cached leaderboard when one exists. Otherwise computes
    /// one and installs it. If the metric source or catalog cannot be
    /// reached, the last cached leaderboard is served with `stale` set, and
    /// the error is returned only when nothing was ever cached.
    pub async fn get_trending(
        &self,
        period: TrendingPeriod,
        limit: usize,
    ) -> Result<TrendingResponse, TrendingError> {
        if let Some(board) = self.cache.get_fresh(period).await {
            debug!("Serving cached leaderboard for period {}", period);
            return Ok(Self::respond(&board, limit, false));
        }

        let generation = self.cache.next_generation();
        let now = Utc::now();
        match self.compute_leaderboard(period, now).await {
            Ok(entries) => {
                let board = Leaderboard::new(period, entries, now, generation);
                let response = Self::respond(&board, limit, false);
                self.cache.install(board).await;
                Ok(response)
            }
            Err(TrendingError::Upstream(e)) => match self.cache.get_any(period).await {
                Some(board) => {
                    warn!(
                        "Serving stale leaderboard for period {} computed at {}: {}",
                        period, board.computed_at, e
                    );
                    Ok(Self::respond(&board, limit, true))
                }
                None => Err(TrendingError::Upstream(e)),
            },
            Err(e) => Err(e),
        }
    }

    /// The editorially curated featured set, empty when none is configured
    pub async fn get_featured(&self) -> Result<Vec<FeaturedItem>, TrendingError> {
        Ok(self.catalog.featured().await?)
    }

    /// Normalized score of one item over the last `period_days` days.
    /// An item without activity scores 0.0.
    pub async fn score(&self, item_id: &str, period_days: u32) -> Result<f64, TrendingError> {
        let period = TrendingPeriod::try_from(period_days).map_err(TrendingError::InvalidPeriod)?;
        let now = Utc::now();
        let catalog = self.load_catalog().await?;
        let windows = self.metrics.window_events(period, now).await?;

        Ok(self
            .ranker
            .score_item(item_id, &windows.current, now, &catalog))
    }

    /// Fresh, uncached ranking for `period_days`
    pub async fn rank(&self, period_days: u32) -> Result<Vec<PeriodScore>, TrendingError> {
        let period = TrendingPeriod::try_from(period_days).map_err(TrendingError::InvalidPeriod)?;
        let catalog = self.load_catalog().await?;
        self.rank_period(period, Utc::now(), &catalog).await
    }

    /// Recompute every period and swap the results into the cache at once.
    ///
    /// Nothing is installed unless all periods compute, so a failed run
    /// leaves the previous leaderboards in place.
    pub async fn recalculate(&self) -> Result<DateTime<Utc>, TrendingError> {
        let generation = self.cache.next_generation();
        let now = Utc::now();
        let catalog = self.load_catalog().await?;

        let mut boards = Vec::with_capacity(TrendingPeriod::ALL.len());
        for period in TrendingPeriod::ALL {
            let entries = Self::to_entries(
                self.rank_period(period, now, &catalog).await?,
                &catalog,
            );
            boards.push(Leaderboard::new(period, entries, now, generation));
        }

        let installed = self.cache.replace_all(boards).await;
        info!(
            "Recalculated trending leaderboards at {} ({} periods installed)",
            now, installed
        );

        Ok(now)
    }

    /// Drop metric events that no period can reach any more
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, TrendingError> {
        let cutoff = now - Duration::days(EVENT_RETENTION_DAYS);
        let removed = self.metrics.prune_before(cutoff).await?;
        if removed > 0 {
            info!("Pruned {} metric events older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    /// Compute the full leaderboard for `period` as of `now`
    pub async fn compute_leaderboard(
        &self,
        period: TrendingPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingEntry>, TrendingError> {
        let catalog = self.load_catalog().await?;
        let scores = self.rank_period(period, now, &catalog).await?;
        Ok(Self::to_entries(scores, &catalog))
    }

    async fn rank_period(
        &self,
        period: TrendingPeriod,
        now: DateTime<Utc>,
        catalog: &HashMap<String, Item>,
    ) -> Result<Vec<PeriodScore>, TrendingError> {
        let windows = self.metrics.window_events(period, now).await?;
        Ok(self.ranker.rank(period, now, &windows, catalog))
    }

    async fn load_catalog(&self) -> Result<HashMap<String, Item>, TrendingError> {
        let items = self.catalog.items().await?;
        Ok(items.into_iter().map(|item| (item.id.clone(), item)).collect())
    }

    fn to_entries(scores: Vec<PeriodScore>, catalog: &HashMap<String, Item>) -> Vec<TrendingEntry> {
        scores
            .into_iter()
            .filter_map(|score| {
                let item = catalog.get(&score.item_id)?;
                Some(TrendingEntry {
                    widget_id: score.item_id,
                    name: item.name.clone(),
                    author: item.author.clone(),
                    score: score.score,
                    rank: score.rank,
                    trend: score.trend,
                    metrics: score.metrics,
                })
            })
            .collect()
    }

    fn respond(board: &Leaderboard, limit: usize, stale: bool) -> TrendingResponse {
        TrendingResponse {
            success: true,
            period: board.period,
            computed_at: board.computed_at,
            stale,
            trending: board.entries.iter().take(limit).cloned().collect(),
        }
    }
}
