use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================================================================================================
// Helix wire format
// ==================================================================================================

/// Every Helix endpoint wraps its rows in `{"data": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct HelixResponse<T> {
    pub data: Vec<T>,
}

impl<T> HelixResponse<T> {
    pub fn first(self) -> Option<T> {
        self.data.into_iter().next()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub offline_image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelixGame {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixStream {
    pub user_login: String,
    pub title: String,
    #[serde(default)]
    pub viewer_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixClip {
    pub id: String,
    pub url: String,
    pub embed_url: String,
    pub title: String,
    pub broadcaster_name: String,
    pub thumbnail_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixChannel {
    pub broadcaster_login: String,
    pub display_name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub viewer_count: Option<i64>,
}

// ==================================================================================================
// Shapes served to the dashboard
// ==================================================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: String,
    pub url: String,
    pub embed_url: String,
    pub title: String,
    pub broadcaster_name: String,
    pub thumbnail_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<HelixClip> for Clip {
    fn from(c: HelixClip) -> Self {
        Self {
            id: c.id,
            url: c.url,
            embed_url: c.embed_url,
            title: c.title,
            broadcaster_name: c.broadcaster_name,
            thumbnail_url: c.thumbnail_url,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamerResult {
    pub display_name: String,
    pub login: String,
    pub avatar_url: String,
    pub viewer_count: i64,
}

impl From<HelixChannel> for StreamerResult {
    fn from(c: HelixChannel) -> Self {
        Self {
            display_name: c.display_name,
            login: c.broadcaster_login,
            avatar_url: c.thumbnail_url.unwrap_or_default(),
            viewer_count: c.viewer_count.unwrap_or(0),
        }
    }
}
