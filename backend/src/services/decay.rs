//! Decay Function
//!
//! Half-life weighting of metric events by age, so recent activity counts for
//! more than old activity inside the same window.

use crate::models::MetricKind;

/// Half-life of a download's contribution
pub const DOWNLOAD_HALF_LIFE_HOURS: f64 = 48.0;

/// Half-life of a rating's contribution
pub const RATING_HALF_LIFE_HOURS: f64 = 72.0;

/// Half-life of a comment's contribution
pub const COMMENT_HALF_LIFE_HOURS: f64 = 24.0;

/// Smallest weight ever returned. Very old events stay positive instead of
/// underflowing to zero.
pub const MIN_WEIGHT: f64 = f64::MIN_POSITIVE;

/// Half-life in hours for a metric kind
pub fn half_life_for(kind: MetricKind) -> f64 {
    match kind {
        MetricKind::Download => DOWNLOAD_HALF_LIFE_HOURS,
        MetricKind::Rating => RATING_HALF_LIFE_HOURS,
        MetricKind::Comment => COMMENT_HALF_LIFE_HOURS,
    }
}

/// Weight of an event that is `age_hours` old: `0.5 ^ (age / half_life)`.
///
/// Returns exactly 1.0 at age 0 and a value in `[MIN_WEIGHT, 1.0]` otherwise.
/// Negative ages (events stamped after the reference time) are treated as
/// age 0. A non-positive or non-finite half-life means no decay.
pub fn weight(age_hours: f64, half_life_hours: f64) -> f64 {
    if !(half_life_hours.is_finite() && half_life_hours > 0.0) {
        return 1.0;
    }
    if age_hours.is_nan() || age_hours <= 0.0 {
        return 1.0;
    }

    let w = 0.5_f64.powf(age_hours / half_life_hours);
    if w.is_nan() || w < MIN_WEIGHT {
        MIN_WEIGHT
    } else {
        w
    }
}

/// Weight of an event of `kind` that is `age_hours` old
pub fn weight_for(kind: MetricKind, age_hours: f64) -> f64 {
    weight(age_hours, half_life_for(kind))
}
