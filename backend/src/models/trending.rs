//! Trending model and related types
//!
//! Periods, trend classification, computed period scores and the wire shapes
//! of the trending endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of entries returned by the trending endpoint
pub const DEFAULT_LIMIT: i64 = 6;

/// Maximum number of entries the trending endpoint will return
pub const MAX_LIMIT: i64 = 50;

/// Trending lookback period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TrendingPeriod {
    Day,
    #[default]
    Week,
    Month,
}

impl TrendingPeriod {
    /// Every supported period, shortest first
    pub const ALL: [TrendingPeriod; 3] = [Self::Day, Self::Week, Self::Month];

    /// Length of the period in days
    pub fn days(&self) -> u32 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
        }
    }

    /// Length of the period as a chrono duration
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days()))
    }
}

impl TryFrom<u32> for TrendingPeriod {
    type Error = String;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            1 => Ok(Self::Day),
            7 => Ok(Self::Week),
            30 => Ok(Self::Month),
            _ => Err(format!(
                "Invalid period: {days}. Valid values are: 1, 7, 30"
            )),
        }
    }
}

impl From<TrendingPeriod> for u32 {
    fn from(period: TrendingPeriod) -> Self {
        period.days()
    }
}

impl fmt::Display for TrendingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

impl FromStr for TrendingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let days: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid period: {s}. Valid values are: 1, 7, 30"))?;
        Self::try_from(days)
    }
}

/// Direction of an item's rank compared to the preceding period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Declining,
    Flat,
}

impl Trend {
    /// Classify a current rank against the rank held in the previous window.
    /// Items that did not rank in the previous window count as rising.
    pub fn classify(current_rank: u32, previous_rank: Option<u32>) -> Self {
        match previous_rank {
            None => Self::Rising,
            Some(prev) if current_rank < prev => Self::Rising,
            Some(prev) if current_rank > prev => Self::Declining,
            Some(_) => Self::Flat,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Declining => write!(f, "declining"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Raw activity figures for one item over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetrics {
    /// Download events in the window
    pub downloads: u64,
    /// Rating component of the score before the rating weight is applied
    pub rating_weighted: f64,
    /// Comment events in the window
    pub comment_activity: u64,
}

/// One ranked item for one period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodScore {
    pub item_id: String,
    pub period: TrendingPeriod,
    /// Normalized score in [0, 100]
    pub score: f64,
    /// 1 is the top of the leaderboard
    pub rank: u32,
    pub trend: Trend,
    pub metrics: ItemMetrics,
}

/// Query parameters for the trending endpoint
///
/// Both fields are taken as strings so malformed values map to the
/// period/limit validation errors instead of a generic extractor failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendingQuery {
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

/// A leaderboard row as served by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub widget_id: String,
    pub name: String,
    pub author: String,
    pub score: f64,
    pub rank: u32,
    pub trend: Trend,
    pub metrics: ItemMetrics,
}

/// Response body for `GET /api/widgets/trending`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingResponse {
    pub success: bool,
    pub period: TrendingPeriod,
    pub computed_at: DateTime<Utc>,
    /// Set when the leaderboard is a last-known-good copy served because
    /// the metric source or catalog could not be reached
    pub stale: bool,
    pub trending: Vec<TrendingEntry>,
}

/// Response body for `POST /api/widgets/trending/calculate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculateResponse {
    pub success: bool,
    pub computed_at: DateTime<Utc>,
}
