use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored favorite, as listed back to its owner
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteClip {
    pub clip_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub broadcaster_name: String,
    pub embed_url: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/favorites/toggle`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteInput {
    #[serde(default)]
    pub clip_id: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub broadcaster_name: Option<String>,
    pub embed_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoritesPage {
    pub total: i64,
    pub items: Vec<FavoriteClip>,
}
