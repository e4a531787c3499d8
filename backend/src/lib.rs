//! WidgetRank - trending and featured widget discovery
//!
//! This library provides the scoring engine, services and HTTP handlers for
//! the widget trending API.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::AppError;

pub use models::{
    FeaturedItem, Item, MetricEvent, MetricKind, PeriodScore, Trend, TrendingEntry,
    TrendingPeriod, TrendingResponse,
};

pub use services::{
    AdminAuth, InMemoryCatalog, InMemoryMetricStore, ItemCatalog, LeaderboardCache,
    MetricEventSource, MetricSnapshotStore, Ranker, ScoreCalculator, ScoreWeights, TrendingJob,
    TrendingJobConfig, TrendingService,
};

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub trending: TrendingService,
}
