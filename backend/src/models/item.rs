//! Catalog item model
//!
//! Widgets as described by the item catalog. Identity is immutable; display
//! metadata belongs to the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shareable widget known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An editorially featured widget, served verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedItem {
    pub widget_id: String,
    pub name: String,
    pub author: String,
    pub description: Option<String>,
}

impl From<&Item> for FeaturedItem {
    fn from(item: &Item) -> Self {
        Self {
            widget_id: item.id.clone(),
            name: item.name.clone(),
            author: item.author.clone(),
            description: item.description.clone(),
        }
    }
}

/// Response body for `GET /api/widgets/featured`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedResponse {
    pub success: bool,
    pub featured: Vec<FeaturedItem>,
}
