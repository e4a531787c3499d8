//! Metric event model
//!
//! Immutable facts about user activity on a widget. The trending engine only
//! ever reads these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted rating value
pub const MIN_RATING: f64 = 1.0;

/// Highest accepted rating value
pub const MAX_RATING: f64 = 5.0;

/// Kind of activity recorded by a metric event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Download,
    Rating,
    Comment,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [Self::Download, Self::Rating, Self::Comment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Rating => "rating",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(Self::Download),
            "rating" => Ok(Self::Rating),
            "comment" => Ok(Self::Comment),
            _ => Err(format!(
                "Invalid metric kind: {s}. Valid values are: download, rating, comment"
            )),
        }
    }
}

/// A single timestamped activity fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub item_id: String,
    pub kind: MetricKind,
    /// Rating value for ratings, 1 for downloads and comments
    pub magnitude: f64,
    pub occurred_at: DateTime<Utc>,
}

impl MetricEvent {
    pub fn download(item_id: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            kind: MetricKind::Download,
            magnitude: 1.0,
            occurred_at,
        }
    }

    pub fn rating(item_id: impl Into<String>, value: f64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            kind: MetricKind::Rating,
            magnitude: value,
            occurred_at,
        }
    }

    pub fn comment(item_id: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item_id.into(),
            kind: MetricKind::Comment,
            magnitude: 1.0,
            occurred_at,
        }
    }

    /// Check the magnitude against the kind of event.
    pub fn validate(&self) -> Result<(), String> {
        if self.item_id.is_empty() {
            return Err("Metric event has an empty item id".to_string());
        }
        match self.kind {
            MetricKind::Rating => {
                if !(MIN_RATING..=MAX_RATING).contains(&self.magnitude) {
                    return Err(format!(
                        "Rating for {} must be between {MIN_RATING} and {MAX_RATING}, got {}",
                        self.item_id, self.magnitude
                    ));
                }
            }
            MetricKind::Download | MetricKind::Comment => {
                if self.magnitude != 1.0 {
                    return Err(format!(
                        "{} event for {} must carry magnitude 1, got {}",
                        self.kind, self.item_id, self.magnitude
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_kind_round_trip_names() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>(), Ok(kind));
        }
        assert!("view".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_events() {
        let now = Utc::now();
        assert!(MetricEvent::download("w-1", now).validate().is_ok());
        assert!(MetricEvent::comment("w-1", now).validate().is_ok());
        assert!(MetricEvent::rating("w-1", 1.0, now).validate().is_ok());
        assert!(MetricEvent::rating("w-1", 5.0, now).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_ratings() {
        let now = Utc::now();
        assert!(MetricEvent::rating("w-1", 0.0, now).validate().is_err());
        assert!(MetricEvent::rating("w-1", 5.5, now).validate().is_err());
        assert!(MetricEvent::rating("w-1", f64::NAN, now).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_counted_events_with_other_magnitudes() {
        let mut event = MetricEvent::download("w-1", Utc::now());
        event.magnitude = 3.0;
        assert!(event.validate().is_err());

        let event = MetricEvent::comment("", Utc::now());
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_event_deserialize() {
        let json = r#"{
            "item_id": "w-9",
            "kind": "rating",
            "magnitude": 4,
            "occurred_at": "2024-01-15T10:30:00Z"
        }"#;

        let event: MetricEvent = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(event.kind, MetricKind::Rating);
        assert_eq!(event.magnitude, 4.0);
    }
}
