//! Seed Loader
//!
//! Loads a JSON fixture into the in-memory catalog and metric store, for
//! running without a database.
//!
//! ```json
//! {
//!   "items": [{ "id": "w-1", "name": "Clock", "author": "ana",
//!               "created_at": "2024-05-01T00:00:00Z" }],
//!   "featured": ["w-1"],
//!   "events": [{ "item_id": "w-1", "kind": "download", "magnitude": 1.0,
//!                "occurred_at": "2024-06-01T11:00:00Z" }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::models::{Item, MetricEvent};
use crate::services::catalog::InMemoryCatalog;
use crate::services::metric_store::InMemoryMetricStore;

/// Errors that can occur while loading a seed file
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid metric event: {0}")]
    InvalidEvent(String),
}

/// Contents of a seed file
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub featured: Vec<String>,
    #[serde(default)]
    pub events: Vec<MetricEvent>,
}

/// What a seed load added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub items: usize,
    pub featured: usize,
    pub events: usize,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json(&contents)
    }

    /// Validate every event, then load everything. Nothing is loaded if any
    /// event is invalid.
    pub async fn apply(
        self,
        catalog: &InMemoryCatalog,
        store: &InMemoryMetricStore,
    ) -> Result<SeedSummary, SeedError> {
        for event in &self.events {
            event
                .validate()
                .map_err(|e| SeedError::InvalidEvent(format!("{}: {}", event.item_id, e)))?;
        }

        let summary = SeedSummary {
            items: self.items.len(),
            featured: self.featured.len(),
            events: self.events.len(),
        };

        for item in self.items {
            catalog.upsert(item).await;
        }
        catalog.set_featured(self.featured).await;
        store
            .record_all(self.events)
            .await
            .map_err(SeedError::InvalidEvent)?;

        Ok(summary)
    }
}

/// Load the seed file at `path` into the in-memory backends
pub async fn load_seed_file(
    path: impl AsRef<Path>,
    catalog: &InMemoryCatalog,
    store: &InMemoryMetricStore,
) -> Result<SeedSummary, SeedError> {
    let path = path.as_ref();
    let summary = SeedData::from_path(path).await?.apply(catalog, store).await?;
    info!(
        "Loaded seed file {}: {} items, {} featured, {} events",
        path.display(),
        summary.items,
        summary.featured,
        summary.events
    );
    Ok(summary)
}
