//! Score Calculator
//!
//! Turns the metric events of one window into one normalized score per item.
//! Scores are relative to the batch: the most active item scores 100.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{ItemMetrics, MetricEvent, MetricKind};
use crate::services::decay;

/// Top of the normalized score scale
pub const MAX_SCORE: f64 = 100.0;

/// Per-kind multipliers applied to the decayed sums
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub download: f64,
    /// Ratings sit on a 1-5 scale and need amplification to compete with counts
    pub rating: f64,
    pub comment: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            download: 1.0,
            rating: 10.0,
            comment: 2.0,
        }
    }
}

/// How per-user ratings collapse into the rating component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RatingAggregation {
    /// Sum of decay-weighted rating values
    #[default]
    DecayedSum,
    /// Decay-weighted mean rating
    DecayedMean,
}

impl FromStr for RatingAggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Self::DecayedSum),
            "mean" => Ok(Self::DecayedMean),
            _ => Err(format!(
                "Invalid rating aggregation: {s}. Valid values are: sum, mean"
            )),
        }
    }
}

/// Score of one item within one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemScore {
    /// Weighted sum before normalization
    pub raw: f64,
    /// Normalized score in [0, 100]
    pub score: f64,
    pub metrics: ItemMetrics,
}

/// Accumulator for one item while walking the events
#[derive(Debug, Default)]
struct Accumulator {
    downloads: u64,
    comments: u64,
    decayed_downloads: f64,
    decayed_comments: f64,
    decayed_rating_sum: f64,
    rating_weight_sum: f64,
}

impl Accumulator {
    fn add(&mut self, event: &MetricEvent, window_end: DateTime<Utc>) {
        let age_hours = (window_end - event.occurred_at).num_milliseconds() as f64 / 3_600_000.0;
        let w = decay::weight_for(event.kind, age_hours);

        match event.kind {
            MetricKind::Download => {
                self.downloads += 1;
                self.decayed_downloads += w * event.magnitude;
            }
            MetricKind::Rating => {
                self.decayed_rating_sum += w * event.magnitude;
                self.rating_weight_sum += w;
            }
            MetricKind::Comment => {
                self.comments += 1;
                self.decayed_comments += w * event.magnitude;
            }
        }
    }

    fn rating_component(&self, aggregation: RatingAggregation) -> f64 {
        match aggregation {
            RatingAggregation::DecayedSum => self.decayed_rating_sum,
            RatingAggregation::DecayedMean => {
                if self.rating_weight_sum > 0.0 {
                    self.decayed_rating_sum / self.rating_weight_sum
                } else {
                    0.0
                }
            }
        }
    }
}

/// Combines decayed metrics into per-item scores
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
    rating_aggregation: RatingAggregation,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights, rating_aggregation: RatingAggregation) -> Self {
        Self {
            weights,
            rating_aggregation,
        }
    }

    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    pub fn rating_aggregation(&self) -> RatingAggregation {
        self.rating_aggregation
    }

    /// Score every item that appears in `events`.
    ///
    /// Event ages are measured from `window_end`. Callers pass only the
    /// events of the window being scored.
    pub fn score_batch(
        &self,
        events: &[MetricEvent],
        window_end: DateTime<Utc>,
    ) -> HashMap<String, ItemScore> {
        let mut accumulators: HashMap<&str, Accumulator> = HashMap::new();
        for event in events {
            accumulators
                .entry(event.item_id.as_str())
                .or_default()
                .add(event, window_end);
        }

        let mut scores: HashMap<String, ItemScore> = accumulators
            .into_iter()
            .map(|(item_id, acc)| {
                let rating = acc.rating_component(self.rating_aggregation);
                let raw = acc.decayed_downloads * self.weights.download
                    + rating * self.weights.rating
                    + acc.decayed_comments * self.weights.comment;

                debug!(
                    "Raw score for {}: downloads={:.3}, rating={:.3}, comments={:.3}, raw={:.3}",
                    item_id, acc.decayed_downloads, rating, acc.decayed_comments, raw
                );

                let score = ItemScore {
                    raw,
                    score: 0.0,
                    metrics: ItemMetrics {
                        downloads: acc.downloads,
                        rating_weighted: rating,
                        comment_activity: acc.comments,
                    },
                };
                (item_id.to_string(), score)
            })
            .collect();

        normalize(&mut scores);
        scores
    }

    /// Normalized score of a single item within the batch; 0.0 if the item
    /// has no activity in it
    pub fn score_item(
        &self,
        item_id: &str,
        events: &[MetricEvent],
        window_end: DateTime<Utc>,
    ) -> f64 {
        self.score_batch(events, window_end)
            .get(item_id)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }
}

/// Scale raw scores so the batch maximum becomes exactly `MAX_SCORE`.
/// A batch whose maximum is zero scores every item 0.
fn normalize(scores: &mut HashMap<String, ItemScore>) {
    let max = scores
        .values()
        .map(|s| s.raw)
        .filter(|raw| raw.is_finite())
        .fold(0.0_f64, f64::max);

    for score in scores.values_mut() {
        score.score = if max > 0.0 && score.raw.is_finite() {
            (score.raw / max * MAX_SCORE).clamp(0.0, MAX_SCORE)
        } else {
            0.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn downloads(item: &str, count: usize, age: Duration) -> Vec<MetricEvent> {
        (0..count)
            .map(|_| MetricEvent::download(item, now() - age))
            .collect()
    }

    #[test]
    fn test_two_half_lives_scenario() {
        // A: 10 downloads now, B: 20 downloads two download half-lives ago
        let mut events = downloads("a", 10, Duration::zero());
        events.extend(downloads("b", 20, Duration::hours(96)));

        let scores = ScoreCalculator::default().score_batch(&events, now());

        assert_eq!(scores["a"].raw, 10.0);
        assert_eq!(scores["b"].raw, 5.0);
        assert_eq!(scores["a"].score, 100.0);
        assert_eq!(scores["b"].score, 50.0);
        assert_eq!(scores["b"].metrics.downloads, 20);
    }

    #[test]
    fn test_kind_weights_are_applied() {
        let now = now();
        let events = vec![
            MetricEvent::download("d", now),
            MetricEvent::rating("r", 3.0, now),
            MetricEvent::comment("c", now),
        ];

        let scores = ScoreCalculator::default().score_batch(&events, now);

        assert_eq!(scores["d"].raw, 1.0);
        assert_eq!(scores["r"].raw, 30.0);
        assert_eq!(scores["c"].raw, 2.0);
        assert_eq!(scores["r"].score, 100.0);
        assert_eq!(scores["r"].metrics.rating_weighted, 3.0);
        assert_eq!(scores["c"].metrics.comment_activity, 1);
    }

    #[test]
    fn test_decayed_mean_rating_policy() {
        let now = now();
        let events = vec![
            MetricEvent::rating("r", 5.0, now),
            MetricEvent::rating("r", 3.0, now),
        ];

        let sum = ScoreCalculator::new(ScoreWeights::default(), RatingAggregation::DecayedSum)
            .score_batch(&events, now);
        let mean = ScoreCalculator::new(ScoreWeights::default(), RatingAggregation::DecayedMean)
            .score_batch(&events, now);

        assert_eq!(sum["r"].metrics.rating_weighted, 8.0);
        assert_eq!(mean["r"].metrics.rating_weighted, 4.0);
        assert_eq!(mean["r"].raw, 40.0);
    }

    #[test]
    fn test_empty_batch() {
        let scores = ScoreCalculator::default().score_batch(&[], now());
        assert!(scores.is_empty());
        assert_eq!(ScoreCalculator::default().score_item("a", &[], now()), 0.0);
    }

    #[test]
    fn test_zero_maximum_never_divides() {
        let mut scores = HashMap::new();
        scores.insert(
            "a".to_string(),
            ItemScore {
                raw: 0.0,
                score: 42.0,
                metrics: ItemMetrics::default(),
            },
        );

        normalize(&mut scores);
        assert_eq!(scores["a"].score, 0.0);
        assert!(!scores["a"].score.is_nan());
    }

    #[test]
    fn test_score_item_for_inactive_item_is_zero() {
        let events = downloads("a", 3, Duration::hours(1));
        let calculator = ScoreCalculator::default();

        assert_eq!(calculator.score_item("a", &events, now()), 100.0);
        assert_eq!(calculator.score_item("b", &events, now()), 0.0);
    }

    #[test]
    fn test_rating_aggregation_from_str() {
        assert_eq!("sum".parse::<RatingAggregation>(), Ok(RatingAggregation::DecayedSum));
        assert_eq!("MEAN".parse::<RatingAggregation>(), Ok(RatingAggregation::DecayedMean));
        assert!("bayes".parse::<RatingAggregation>().is_err());
    }

    mod property_normalization {
        use super::*;
        use proptest::prelude::*;

        fn event_strategy() -> impl Strategy<Value = MetricEvent> {
            (
                prop::sample::select(vec!["a", "b", "c", "d", "e"]),
                prop::sample::select(MetricKind::ALL.to_vec()),
                1u8..=5,
                0i64..(30 * 24 * 60),
            )
                .prop_map(|(item, kind, rating, age_minutes)| {
                    let at = now() - Duration::minutes(age_minutes);
                    match kind {
                        MetricKind::Download => MetricEvent::download(item, at),
                        MetricKind::Rating => MetricEvent::rating(item, f64::from(rating), at),
                        MetricKind::Comment => MetricEvent::comment(item, at),
                    }
                })
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// The top item of any non-empty batch scores exactly 100 and
            /// every other score lies in [0, 100].
            #[test]
            fn batch_maximum_is_exactly_one_hundred(
                events in prop::collection::vec(event_strategy(), 1..60)
            ) {
                let scores = ScoreCalculator::default().score_batch(&events, now());
                let max = scores.values().map(|s| s.score).fold(f64::MIN, f64::max);

                prop_assert_eq!(max, MAX_SCORE);
                for score in scores.values() {
                    prop_assert!((0.0..=MAX_SCORE).contains(&score.score));
                }
            }
        }
    }
}
