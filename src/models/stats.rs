use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of a `GetStats_*` view
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsRow {
    pub channel_login: String,
    pub avg_viewers: f64,
    pub max_viewers: i64,
    pub minutes_streamed: i64,
    pub hours_watched: f64,
    pub current_viewers: Option<i64>,
    pub followers_latest: Option<i64>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub current_language: Option<String>,
    pub current_game: Option<String>,
    /// Attached from `LatestAvatarPerChannel`, not part of the view
    pub avatar_url: Option<String>,
}

/// One row of a `GetFollowers_*` view
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowersRow {
    pub channel_login: String,
    pub followers_max: i64,
    pub followers_min: i64,
    pub followers_gained: i64,
    pub first_bucket: DateTime<Utc>,
    pub last_bucket: DateTime<Utc>,
    pub followers_total_now: Option<i64>,
}

/// Parsed entry of a `GetStreamGamesList_*` games column
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GameEntry {
    pub name: String,
    pub minutes: i64,
}
