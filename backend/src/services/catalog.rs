//! Item Catalog
//!
//! Read access to widget identity, display metadata and the editorial
//! featured set.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;

use crate::models::{FeaturedItem, Item};
use crate::services::metric_store::SourceError;

/// Source of catalog data
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    /// Every known item
    async fn items(&self) -> Result<Vec<Item>, SourceError>;

    /// The curated featured set, in editorial order
    async fn featured(&self) -> Result<Vec<FeaturedItem>, SourceError>;
}

#[derive(Debug, Default)]
struct CatalogState {
    items: HashMap<String, Item>,
    featured: Vec<String>,
}

/// In-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item
    pub async fn upsert(&self, item: Item) {
        self.state.write().await.items.insert(item.id.clone(), item);
    }

    /// Replace the featured set. Unknown ids are kept and resolved lazily, so
    /// the featured list may be set before its items arrive.
    pub async fn set_featured(&self, ids: Vec<String>) {
        self.state.write().await.featured = ids;
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ItemCatalog for InMemoryCatalog {
    async fn items(&self) -> Result<Vec<Item>, SourceError> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }

    async fn featured(&self) -> Result<Vec<FeaturedItem>, SourceError> {
        let state = self.state.read().await;
        Ok(state
            .featured
            .iter()
            .filter_map(|id| state.items.get(id))
            .map(FeaturedItem::from)
            .collect())
    }
}

/// Postgres-backed catalog over the `widgets` and `featured_widgets` tables
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemCatalog for PgCatalog {
    async fn items(&self) -> Result<Vec<Item>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT widget_id, name, author, description, created_at
            FROM widgets
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Item {
                id: row.get("widget_id"),
                name: row.get("name"),
                author: row.get("author"),
                description: row.get("description"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn featured(&self) -> Result<Vec<FeaturedItem>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT w.widget_id, w.name, w.author, w.description
            FROM featured_widgets f
            JOIN widgets w ON f.widget_id = w.widget_id
            ORDER BY f.position ASC, w.widget_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeaturedItem {
                widget_id: row.get("widget_id"),
                name: row.get("name"),
                author: row.get("author"),
                description: row.get("description"),
            })
            .collect())
    }
}
