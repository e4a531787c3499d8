//! Ranker
//!
//! Orders scored items into a leaderboard and classifies each item's trend
//! against the window immediately before the current one.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::{Item, MetricEvent, PeriodScore, Trend, TrendingPeriod};
use crate::services::metric_store::WindowedEvents;
use crate::services::scoring::{ItemScore, ScoreCalculator};

/// A scored item with the catalog fields needed for tie-breaking
struct Candidate<'a> {
    item: &'a Item,
    score: ItemScore,
}

/// Leaderboard order: score descending, then raw downloads descending, then
/// earlier creation, then item id so the order is total.
fn leaderboard_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .score
        .total_cmp(&a.score.score)
        .then_with(|| b.score.metrics.downloads.cmp(&a.score.metrics.downloads))
        .then_with(|| a.item.created_at.cmp(&b.item.created_at))
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Builds ranked leaderboards from windowed events
#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker {
    calculator: ScoreCalculator,
}

impl Ranker {
    pub fn new(calculator: ScoreCalculator) -> Self {
        Self { calculator }
    }

    /// Rank the current window of `period` ending at `now`.
    ///
    /// Only items with activity in the window are ranked, so a window with no
    /// activity yields an empty leaderboard. Items missing from `catalog` are
    /// skipped.
    pub fn rank(
        &self,
        period: TrendingPeriod,
        now: DateTime<Utc>,
        events: &WindowedEvents,
        catalog: &HashMap<String, Item>,
    ) -> Vec<PeriodScore> {
        let previous_end = now - period.duration();
        let previous_ranks: HashMap<String, u32> = self
            .ordered(&events.previous, previous_end, catalog)
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| (candidate.item.id.clone(), index as u32 + 1))
            .collect();

        self.ordered(&events.current, now, catalog)
            .into_iter()
            .enumerate()
            .map(|(index, candidate)| {
                let rank = index as u32 + 1;
                let trend = Trend::classify(rank, previous_ranks.get(&candidate.item.id).copied());
                PeriodScore {
                    item_id: candidate.item.id.clone(),
                    period,
                    score: candidate.score.score,
                    rank,
                    trend,
                    metrics: candidate.score.metrics,
                }
            })
            .collect()
    }

    /// Normalized score of one item over the current window. Only catalogued
    /// items take part in normalization; an inactive item scores 0.0.
    pub fn score_item(
        &self,
        item_id: &str,
        events: &[MetricEvent],
        now: DateTime<Utc>,
        catalog: &HashMap<String, Item>,
    ) -> f64 {
        self.calculator
            .score_item(item_id, &catalogued_events(events, catalog), now)
    }

    /// Score one window and sort it into leaderboard order
    fn ordered<'a>(
        &self,
        events: &[MetricEvent],
        window_end: DateTime<Utc>,
        catalog: &'a HashMap<String, Item>,
    ) -> Vec<Candidate<'a>> {
        let mut candidates: Vec<Candidate<'a>> = self
            .calculator
            .score_batch(&catalogued_events(events, catalog), window_end)
            .into_iter()
            .filter_map(|(item_id, score)| {
                catalog.get(&item_id).map(|item| Candidate { item, score })
            })
            .collect();

        candidates.sort_by(leaderboard_order);
        candidates
    }
}

/// Events whose item is in `catalog`. Uncatalogued items never reach the
/// batch, so they cannot set its maximum.
fn catalogued_events(events: &[MetricEvent], catalog: &HashMap<String, Item>) -> Vec<MetricEvent> {
    let mut missing = BTreeSet::new();
    let kept = events
        .iter()
        .filter(|event| {
            let known = catalog.contains_key(&event.item_id);
            if !known {
                missing.insert(event.item_id.as_str());
            }
            known
        })
        .cloned()
        .collect();

    for item_id in missing {
        warn!("Skipping metrics for item {} missing from catalog", item_id);
    }
    kept
}
