//! Leaderboard Cache
//!
//! In-memory, per-period cache of computed leaderboards with a TTL.
//! Entries are immutable and replaced wholesale; readers hold an `Arc` to
//! the leaderboard they fetched, so they never observe a partial update.
//!
//! Every computation draws a generation number before it reads data. An
//! install carrying an older generation than the entry already cached is
//! discarded, which is how a superseded recomputation gets dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{TrendingEntry, TrendingPeriod};

/// Default leaderboard TTL (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A computed leaderboard for one period
#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub period: TrendingPeriod,
    /// Full ranked list, not truncated to any request limit
    pub entries: Vec<TrendingEntry>,
    pub computed_at: DateTime<Utc>,
    generation: u64,
    cached_at: Instant,
}

impl Leaderboard {
    pub fn new(
        period: TrendingPeriod,
        entries: Vec<TrendingEntry>,
        computed_at: DateTime<Utc>,
        generation: u64,
    ) -> Self {
        Self {
            period,
            entries,
            computed_at,
            generation,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

pub struct LeaderboardCache {
    boards: RwLock<HashMap<TrendingPeriod, Arc<Leaderboard>>>,
    ttl: Duration,
    generations: AtomicU64,
}

impl Default for LeaderboardCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl LeaderboardCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            ttl,
            generations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Draw the generation number for a computation about to start
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Cached leaderboard for `period` if it is younger than the TTL
    pub async fn get_fresh(&self, period: TrendingPeriod) -> Option<Arc<Leaderboard>> {
        let boards = self.boards.read().await;
        boards
            .get(&period)
            .filter(|board| !board.is_expired(self.ttl))
            .cloned()
    }

    /// Cached leaderboard for `period` regardless of age
    pub async fn get_any(&self, period: TrendingPeriod) -> Option<Arc<Leaderboard>> {
        self.boards.read().await.get(&period).cloned()
    }

    /// Install one leaderboard. Returns false if a newer generation is
    /// already cached for its period.
    pub async fn install(&self, board: Leaderboard) -> bool {
        let mut boards = self.boards.write().await;
        Self::install_locked(&mut boards, board)
    }

    /// Install a full recomputation under one write lock. Returns how many
    /// periods were replaced.
    pub async fn replace_all(&self, new_boards: Vec<Leaderboard>) -> usize {
        let mut boards = self.boards.write().await;
        new_boards
            .into_iter()
            .map(|board| Self::install_locked(&mut boards, board))
            .filter(|installed| *installed)
            .count()
    }

    /// Drop every cached leaderboard
    pub async fn invalidate(&self) {
        self.boards.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.boards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.boards.read().await.is_empty()
    }

    fn install_locked(
        boards: &mut HashMap<TrendingPeriod, Arc<Leaderboard>>,
        board: Leaderboard,
    ) -> bool {
        if let Some(existing) = boards.get(&board.period) {
            if existing.generation > board.generation {
                debug!(
                    "Discarding superseded leaderboard for {} (generation {} < {})",
                    board.period, board.generation, existing.generation
                );
                return false;
            }
        }
        boards.insert(board.period, Arc::new(board));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemMetrics, Trend};

    fn entry(id: &str) -> TrendingEntry {
        TrendingEntry {
            widget_id: id.to_string(),
            name: id.to_string(),
            author: "ana".to_string(),
            score: 100.0,
            rank: 1,
            trend: Trend::Rising,
            metrics: ItemMetrics::default(),
        }
    }

    fn board(period: TrendingPeriod, id: &str, generation: u64) -> Leaderboard {
        Leaderboard::new(period, vec![entry(id)], Utc::now(), generation)
    }

    #[tokio::test]
    async fn test_get_fresh_respects_ttl() {
        let cache = LeaderboardCache::new(Duration::from_millis(20));
        cache.install(board(TrendingPeriod::Week, "w-1", 1)).await;
        assert!(cache.get_fresh(TrendingPeriod::Week).await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(cache.get_fresh(TrendingPeriod::Week).await.is_none());
        // Expired entries remain available as last-known-good
        assert!(cache.get_any(TrendingPeriod::Week).await.is_some());
    }

    #[tokio::test]
    async fn test_periods_are_cached_independently() {
        let cache = LeaderboardCache::default();
        cache.install(board(TrendingPeriod::Day, "w-day", 1)).await;

        assert!(cache.get_fresh(TrendingPeriod::Day).await.is_some());
        assert!(cache.get_fresh(TrendingPeriod::Week).await.is_none());
        assert!(cache.get_any(TrendingPeriod::Month).await.is_none());
    }

    #[tokio::test]
    async fn test_older_generation_is_discarded() {
        let cache = LeaderboardCache::default();
        let older = cache.next_generation();
        let newer = cache.next_generation();
        assert!(newer > older);

        assert!(cache.install(board(TrendingPeriod::Week, "newer", newer)).await);
        assert!(!cache.install(board(TrendingPeriod::Week, "older", older)).await);

        let cached = cache.get_any(TrendingPeriod::Week).await.unwrap();
        assert_eq!(cached.entries[0].widget_id, "newer");
    }

    #[tokio::test]
    async fn test_replace_all_swaps_every_period() {
        let cache = LeaderboardCache::default();
        let first = cache.next_generation();
        cache
            .replace_all(
                TrendingPeriod::ALL
                    .iter()
                    .map(|p| board(*p, "first", first))
                    .collect(),
            )
            .await;

        let reader_view = cache.get_any(TrendingPeriod::Day).await.unwrap();

        let second = cache.next_generation();
        let replaced = cache
            .replace_all(
                TrendingPeriod::ALL
                    .iter()
                    .map(|p| board(*p, "second", second))
                    .collect(),
            )
            .await;
        assert_eq!(replaced, 3);

        for period in TrendingPeriod::ALL {
            let cached = cache.get_any(period).await.unwrap();
            assert_eq!(cached.entries[0].widget_id, "second");
        }
        // A reader holding the old leaderboard keeps a consistent copy
        assert_eq!(reader_view.entries[0].widget_id, "first");
    }

    #[tokio::test]
    async fn test_replace_all_keeps_newer_on_demand_results() {
        let cache = LeaderboardCache::default();
        let background = cache.next_generation();
        let on_demand = cache.next_generation();

        cache
            .install(board(TrendingPeriod::Week, "on-demand", on_demand))
            .await;
        let replaced = cache
            .replace_all(
                TrendingPeriod::ALL
                    .iter()
                    .map(|p| board(*p, "background", background))
                    .collect(),
            )
            .await;

        assert_eq!(replaced, 2);
        let week = cache.get_any(TrendingPeriod::Week).await.unwrap();
        assert_eq!(week.entries[0].widget_id, "on-demand");
    }

    #[tokio::test]
    async fn test_invalidate_clears_everything() {
        let cache = LeaderboardCache::default();
        cache.install(board(TrendingPeriod::Week, "w-1", 1)).await;
        assert_eq!(cache.len().await, 1);

        cache.invalidate().await;
        assert!(cache.is_empty().await);
    }
}
