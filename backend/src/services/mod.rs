pub mod admin_auth;
pub mod catalog;
pub mod decay;
pub mod jobs;
pub mod leaderboard_cache;
pub mod metric_store;
pub mod ranking;
pub mod scoring;
pub mod seed;
pub mod trending;

pub use admin_auth::{AdminAuth, AdminCaller, AuthError};
pub use catalog::{InMemoryCatalog, ItemCatalog, PgCatalog};
pub use jobs::{TrendingJob, TrendingJobConfig, run_trending_recompute};
pub use leaderboard_cache::{DEFAULT_CACHE_TTL, Leaderboard, LeaderboardCache};
pub use metric_store::{
    InMemoryMetricStore, MetricEventSource, MetricSnapshotStore, PgMetricStore, SourceError,
    WindowedEvents,
};
pub use ranking::Ranker;
pub use scoring::{ItemScore, MAX_SCORE, RatingAggregation, ScoreCalculator, ScoreWeights};
pub use seed::{SeedData, SeedError, SeedSummary, load_seed_file};
pub use trending::{EVENT_RETENTION_DAYS, TrendingError, TrendingService};
