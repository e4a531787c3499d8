//! MetricSnapshot Store
//!
//! Read access to raw metric events, bucketed by time. The engine never
//! writes events on behalf of users; the in-memory store's `record` exists for
//! seeding and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::{MetricEvent, MetricKind, TrendingPeriod};
use crate::services::trending::TrendingError;

/// Width of one in-memory bucket
const BUCKET_SECS: i64 = 3600;

/// Errors raised by external collaborators (metric source, item catalog)
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Append-only feed of metric events
///
/// Implementations include `InMemoryMetricStore` for single-node deployments
/// and tests, and `PgMetricStore` for the `metric_events` table.
#[async_trait]
pub trait MetricEventSource: Send + Sync {
    /// All events with `start <= occurred_at <= end`
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricEvent>, SourceError>;

    /// Total raw magnitude of one kind for one item with
    /// `start <= occurred_at <= end`
    async fn aggregate(
        &self,
        item_id: &str,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, SourceError>;

    /// Delete events older than `cutoff`, returning how many were removed
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SourceError>;
}

fn bucket_of(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(BUCKET_SECS)
}

/// In-memory event store with hour buckets
#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    buckets: RwLock<BTreeMap<i64, Vec<MetricEvent>>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a validated event
    pub async fn record(&self, event: MetricEvent) -> Result<(), String> {
        event.validate()?;
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(bucket_of(event.occurred_at))
            .or_default()
            .push(event);
        Ok(())
    }

    /// Store many events, stopping at the first invalid one
    pub async fn record_all(
        &self,
        events: impl IntoIterator<Item = MetricEvent>,
    ) -> Result<usize, String> {
        let mut count = 0;
        for event in events {
            self.record(event).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Number of stored events
    pub async fn len(&self) -> usize {
        self.buckets.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MetricEventSource for InMemoryMetricStore {
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricEvent>, SourceError> {
        if start > end {
            return Ok(Vec::new());
        }

        let buckets = self.buckets.read().await;
        let events = buckets
            .range(bucket_of(start)..=bucket_of(end))
            .flat_map(|(_, events)| events.iter())
            .filter(|e| e.occurred_at >= start && e.occurred_at <= end)
            .cloned()
            .collect();

        Ok(events)
    }

    async fn aggregate(
        &self,
        item_id: &str,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, SourceError> {
        if start > end {
            return Ok(0.0);
        }

        let buckets = self.buckets.read().await;
        let total = buckets
            .range(bucket_of(start)..=bucket_of(end))
            .flat_map(|(_, events)| events.iter())
            .filter(|e| {
                e.item_id == item_id
                    && e.kind == kind
                    && e.occurred_at >= start
                    && e.occurred_at <= end
            })
            .map(|e| e.magnitude)
            .sum();

        Ok(total)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SourceError> {
        let cutoff_bucket = bucket_of(cutoff);
        let mut buckets = self.buckets.write().await;

        // Whole buckets before the cutoff bucket go at once
        let kept = buckets.split_off(&cutoff_bucket);
        let mut removed: usize = buckets.values().map(Vec::len).sum();
        *buckets = kept;

        let mut boundary_emptied = false;
        if let Some(events) = buckets.get_mut(&cutoff_bucket) {
            let before = events.len();
            events.retain(|e| e.occurred_at >= cutoff);
            removed += before - events.len();
            boundary_emptied = events.is_empty();
        }
        if boundary_emptied {
            buckets.remove(&cutoff_bucket);
        }

        debug!("Pruned {} metric events older than {}", removed, cutoff);
        Ok(removed as u64)
    }
}

/// Postgres-backed event source reading the `metric_events` table
#[derive(Debug, Clone)]
pub struct PgMetricStore {
    pool: PgPool,
}

impl PgMetricStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricEventSource for PgMetricStore {
    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricEvent>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT
                widget_id,
                kind,
                CAST(magnitude AS DOUBLE PRECISION) AS magnitude,
                occurred_at
            FROM metric_events
            WHERE occurred_at >= $1 AND occurred_at <= $2
            ORDER BY occurred_at
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let kind = match kind.parse::<MetricKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    warn!("Skipping metric event with unknown kind: {}", e);
                    continue;
                }
            };
            events.push(MetricEvent {
                item_id: row.get("widget_id"),
                kind,
                magnitude: row.get("magnitude"),
                occurred_at: row.get("occurred_at"),
            });
        }

        Ok(events)
    }

    async fn aggregate(
        &self,
        item_id: &str,
        kind: MetricKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<f64, SourceError> {
        let total: f64 = sqlx::query_scalar(
            r#"
            SELECT CAST(COALESCE(SUM(magnitude), 0) AS DOUBLE PRECISION)
            FROM metric_events
            WHERE widget_id = $1 AND kind = $2
              AND occurred_at >= $3 AND occurred_at <= $4
            "#,
        )
        .bind(item_id)
        .bind(kind.as_str())
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SourceError> {
        let result = sqlx::query("DELETE FROM metric_events WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

/// Events covering one period's current window and the window right before it
#[derive(Debug, Clone, Default)]
pub struct WindowedEvents {
    /// `[now - period, now]`
    pub current: Vec<MetricEvent>,
    /// `[now - 2 * period, now - period)`
    pub previous: Vec<MetricEvent>,
}

/// Period-aware view over a metric event source
#[derive(Clone)]
pub struct MetricSnapshotStore {
    source: Arc<dyn MetricEventSource>,
}

impl MetricSnapshotStore {
    pub fn new(source: Arc<dyn MetricEventSource>) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Arc<dyn MetricEventSource> {
        &self.source
    }

    /// Total raw magnitude of `kind` for `item_id` over the last
    /// `period_days` days. No activity is 0.0, not an error.
    pub async fn aggregate(
        &self,
        item_id: &str,
        kind: MetricKind,
        period_days: u32,
    ) -> Result<f64, TrendingError> {
        self.aggregate_at(item_id, kind, period_days, Utc::now())
            .await
    }

    /// Same as [`Self::aggregate`] with an explicit reference time
    pub async fn aggregate_at(
        &self,
        item_id: &str,
        kind: MetricKind,
        period_days: u32,
        now: DateTime<Utc>,
    ) -> Result<f64, TrendingError> {
        let period = TrendingPeriod::try_from(period_days).map_err(TrendingError::InvalidPeriod)?;
        let total = self
            .source
            .aggregate(item_id, kind, now - period.duration(), now)
            .await?;
        Ok(total)
    }

    /// Fetch the current and previous windows of `period` in one read
    pub async fn window_events(
        &self,
        period: TrendingPeriod,
        now: DateTime<Utc>,
    ) -> Result<WindowedEvents, SourceError> {
        let boundary = now - period.duration();
        let start = boundary - period.duration();

        let events = self.source.events_between(start, now).await?;
        let (current, previous): (Vec<_>, Vec<_>) =
            events.into_iter().partition(|e| e.occurred_at >= boundary);

        debug!(
            "Loaded {} current and {} previous events for period {}",
            current.len(),
            previous.len(),
            period
        );

        Ok(WindowedEvents { current, previous })
    }

    /// Drop events older than `cutoff`
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, SourceError> {
        self.source.prune_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    async fn seeded_store() -> Arc<InMemoryMetricStore> {
        let now = now();
        let store = Arc::new(InMemoryMetricStore::new());
        store
            .record_all(vec![
                MetricEvent::download("w-1", now - Duration::hours(1)),
                MetricEvent::download("w-1", now - Duration::hours(30)),
                MetricEvent::download("w-1", now - Duration::days(10)),
                MetricEvent::rating("w-1", 4.0, now - Duration::hours(2)),
                MetricEvent::comment("w-2", now - Duration::days(3)),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_record_rejects_invalid_events() {
        let store = InMemoryMetricStore::new();
        let result = store.record(MetricEvent::rating("w-1", 9.0, now())).await;
        assert!(result.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_aggregate_sums_magnitude_in_window() {
        let snapshot = MetricSnapshotStore::new(seeded_store().await);

        let day = snapshot
            .aggregate_at("w-1", MetricKind::Download, 1, now())
            .await
            .unwrap();
        assert_eq!(day, 1.0);

        let week = snapshot
            .aggregate_at("w-1", MetricKind::Download, 7, now())
            .await
            .unwrap();
        assert_eq!(week, 2.0);

        let month = snapshot
            .aggregate_at("w-1", MetricKind::Download, 30, now())
            .await
            .unwrap();
        assert_eq!(month, 3.0);

        let rating = snapshot
            .aggregate_at("w-1", MetricKind::Rating, 1, now())
            .await
            .unwrap();
        assert_eq!(rating, 4.0);
    }

    #[tokio::test]
    async fn test_aggregate_without_activity_is_zero() {
        let snapshot = MetricSnapshotStore::new(seeded_store().await);

        let total = snapshot
            .aggregate_at("w-unknown", MetricKind::Comment, 30, now())
            .await
            .unwrap();
        assert_eq!(total, 0.0);

        let total = snapshot
            .aggregate_at("w-2", MetricKind::Comment, 1, now())
            .await
            .unwrap();
        assert_eq!(total, 0.0);
    }

    #[tokio::test]
    async fn test_aggregate_rejects_unsupported_period() {
        let snapshot = MetricSnapshotStore::new(seeded_store().await);

        for period in [0, 2, 5, 14, 90] {
            let result = snapshot
                .aggregate_at("w-1", MetricKind::Download, period, now())
                .await;
            assert!(matches!(result, Err(TrendingError::InvalidPeriod(_))));
        }
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let now = now();
        let store = Arc::new(InMemoryMetricStore::new());
        store
            .record(MetricEvent::download("w-1", now - Duration::days(1)))
            .await
            .unwrap();
        store.record(MetricEvent::download("w-1", now)).await.unwrap();

        let events = store
            .events_between(now - Duration::days(1), now)
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_window_events_splits_at_period_boundary() {
        let now = now();
        let store = Arc::new(InMemoryMetricStore::new());
        store
            .record_all(vec![
                MetricEvent::download("w-1", now - Duration::hours(3)),
                // Exactly on the boundary belongs to the current window
                MetricEvent::download("w-2", now - Duration::days(1)),
                MetricEvent::download("w-3", now - Duration::hours(30)),
                MetricEvent::download("w-4", now - Duration::hours(60)),
            ])
            .await
            .unwrap();

        let snapshot = MetricSnapshotStore::new(store);
        let windows = snapshot
            .window_events(TrendingPeriod::Day, now)
            .await
            .unwrap();

        let current: Vec<_> = windows.current.iter().map(|e| e.item_id.as_str()).collect();
        let previous: Vec<_> = windows.previous.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(current, vec!["w-2", "w-1"]);
        assert_eq!(previous, vec!["w-3"]);
    }

    #[tokio::test]
    async fn test_prune_removes_only_older_events() {
        let now = now();
        let store = seeded_store().await;
        assert_eq!(store.len().await, 5);

        let removed = store.prune_before(now - Duration::days(5)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 4);

        // Cutoff inside a bucket keeps the younger half of it
        let removed = store
            .prune_before(now - Duration::minutes(90))
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(store.len().await, 1);
    }
}
