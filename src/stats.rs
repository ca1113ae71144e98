// Streamer statistics: range selection, sorting, filtering and paging of view rows

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::helix::HelixClient;
use crate::models::stats::{FollowersRow, GameEntry, StatsRow};

pub const AVATAR_PLACEHOLDER: &str = "/img/avatar-placeholder.png";

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsRange {
    Day,
    Week,
    Month,
    All,
}

impl StatsRange {
    pub const ALL: [StatsRange; 4] = [
        StatsRange::Day,
        StatsRange::Week,
        StatsRange::Month,
        StatsRange::All,
    ];

    /// Unknown values fall back to the last 24 hours
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "7d" => StatsRange::Week,
            "30d" => StatsRange::Month,
            "all" => StatsRange::All,
            _ => StatsRange::Day,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsRange::Day => "24h",
            StatsRange::Week => "7d",
            StatsRange::Month => "30d",
            StatsRange::All => "all",
        }
    }

    fn view_suffix(&self) -> &'static str {
        match self {
            StatsRange::Day => "24h",
            StatsRange::Week => "7d",
            StatsRange::Month => "30d",
            StatsRange::All => "AllTime",
        }
    }

    pub fn stats_view(&self) -> String {
        format!("GetStats_{}", self.view_suffix())
    }

    pub fn followers_view(&self) -> String {
        format!("GetFollowers_{}", self.view_suffix())
    }

    pub fn games_view(&self) -> String {
        format!("GetStreamGamesList_{}", self.view_suffix())
    }

    pub fn games_column(&self) -> String {
        format!("Games{}", self.view_suffix())
    }

    /// Range whose followers total is subtracted for the growth figure
    fn previous(&self) -> Option<StatsRange> {
        match self {
            StatsRange::Day => None,
            StatsRange::Week => Some(StatsRange::Day),
            StatsRange::Month => Some(StatsRange::Week),
            StatsRange::All => Some(StatsRange::Month),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Avg,
    Max,
    Hours,
    Followers,
    Current,
}

impl SortKey {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "max" => SortKey::Max,
            "hours" => SortKey::Hours,
            "followers" => SortKey::Followers,
            "current" => SortKey::Current,
            _ => SortKey::Avg,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Avg => "avg",
            SortKey::Max => "max",
            SortKey::Hours => "hours",
            SortKey::Followers => "followers",
            SortKey::Current => "current",
        }
    }

    fn compare(&self, a: &StatsRow, b: &StatsRow) -> Ordering {
        match self {
            SortKey::Avg => a.avg_viewers.total_cmp(&b.avg_viewers),
            SortKey::Max => a.max_viewers.cmp(&b.max_viewers),
            SortKey::Hours => a.hours_watched.total_cmp(&b.hours_watched),
            SortKey::Followers => a
                .followers_latest
                .unwrap_or(0)
                .cmp(&b.followers_latest.unwrap_or(0)),
            SortKey::Current => a
                .current_viewers
                .unwrap_or(0)
                .cmp(&b.current_viewers.unwrap_or(0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            SortDir::Asc
        } else {
            SortDir::Desc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// Raw query string of `GET /api/stats`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub range: Option<String>,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub language: Option<String>,
    pub game: Option<String>,
}

/// Normalized listing request
#[derive(Debug, Clone, PartialEq)]
pub struct StatsQuery {
    pub range: StatsRange,
    pub page_number: u32,
    pub page_size: u32,
    pub sort_by: SortKey,
    pub sort_dir: SortDir,
    pub language: Option<String>,
    pub game: Option<String>,
}

impl From<StatsParams> for StatsQuery {
    fn from(p: StatsParams) -> Self {
        let page_size = match p.page_size {
            Some(size) if size <= 0 => DEFAULT_PAGE_SIZE,
            Some(size) => size.min(MAX_PAGE_SIZE as i64) as u32,
            None => DEFAULT_PAGE_SIZE,
        };
        let page_number = p.page_number.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;

        Self {
            range: StatsRange::parse(p.range.as_deref().unwrap_or("24h")),
            page_number,
            page_size,
            sort_by: SortKey::parse(p.sort_by.as_deref().unwrap_or("avg")),
            sort_dir: SortDir::parse(p.sort_dir.as_deref().unwrap_or("desc")),
            language: p.language.filter(|l| !l.trim().is_empty()),
            game: p.game.filter(|g| !g.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsPage {
    pub items: Vec<StatsRow>,
    pub range: &'static str,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: usize,
    pub total_pages: usize,
    pub sort_by: &'static str,
    pub sort_dir: &'static str,
    pub language: Option<String>,
    pub game: Option<String>,
    pub language_options: Vec<String>,
    pub game_options: Vec<String>,
}

impl StatsPage {
    /// Shape returned when the views cannot be read
    pub fn empty(query: &StatsQuery) -> Self {
        Self {
            items: Vec::new(),
            range: query.range.as_str(),
            page_number: query.page_number,
            page_size: query.page_size,
            total_items: 0,
            total_pages: 0,
            sort_by: query.sort_by.as_str(),
            sort_dir: query.sort_dir.as_str(),
            language: query.language.clone(),
            game: query.game.clone(),
            language_options: Vec::new(),
            game_options: Vec::new(),
        }
    }
}

fn distinct_sorted<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Vec<String> {
    values
        .flatten()
        .filter(|v| !v.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Filter, sort and page the rows of one stats view
pub fn build_page(
    rows: &[StatsRow],
    avatars: &HashMap<String, String>,
    query: &StatsQuery,
) -> StatsPage {
    let language_options = distinct_sorted(rows.iter().map(|r| r.current_language.as_ref()));
    let game_options = distinct_sorted(rows.iter().map(|r| r.current_game.as_ref()));

    let mut filtered: Vec<&StatsRow> = rows
        .iter()
        .filter(|r| match &query.language {
            Some(language) => r.current_language.as_ref() == Some(language),
            None => true,
        })
        .filter(|r| match &query.game {
            Some(game) => r.current_game.as_ref() == Some(game),
            None => true,
        })
        .collect();

    filtered.sort_by(|a, b| {
        let ord = query.sort_by.compare(a, b);
        match query.sort_dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });

    let total_items = filtered.len();
    let page_size = query.page_size.max(1) as usize;
    let items = filtered
        .into_iter()
        .skip((query.page_number.max(1) as usize - 1) * page_size)
        .take(page_size)
        .map(|row| {
            let mut row = row.clone();
            if let Some(url) = avatars.get(&row.channel_login) {
                row.avatar_url = Some(url.clone());
            }
            row
        })
        .collect();

    StatsPage {
        items,
        total_items,
        total_pages: total_items.div_ceil(page_size),
        language_options,
        game_options,
        ..StatsPage::empty(query)
    }
}

/// Parse a games column such as `"Just Chatting (336m), Fortnite (12m)"`.
///
/// Parts without a name before `(` are skipped; unreadable minutes count as 0.
pub fn parse_game_list(games: &str) -> Vec<GameEntry> {
    games
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            let idx = part.rfind('(')?;
            if idx == 0 {
                return None;
            }
            let name = part[..idx].trim().to_string();
            let minutes = part[idx + 1..]
                .trim()
                .replace("m)", "")
                .replace('m', "")
                .trim()
                .parse()
                .unwrap_or(0);
            Some(GameEntry { name, minutes })
        })
        .collect()
}

/// One value per range, serialized under the range's query name
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RangeSet<T> {
    #[serde(rename = "24h")]
    pub day: Option<T>,
    #[serde(rename = "7d")]
    pub week: Option<T>,
    #[serde(rename = "30d")]
    pub month: Option<T>,
    pub all: Option<T>,
}

impl<T> Default for RangeSet<T> {
    fn default() -> Self {
        Self {
            day: None,
            week: None,
            month: None,
            all: None,
        }
    }
}

impl<T> RangeSet<T> {
    pub fn get(&self, range: StatsRange) -> Option<&T> {
        match range {
            StatsRange::Day => self.day.as_ref(),
            StatsRange::Week => self.week.as_ref(),
            StatsRange::Month => self.month.as_ref(),
            StatsRange::All => self.all.as_ref(),
        }
    }

    pub fn set(&mut self, range: StatsRange, value: Option<T>) {
        match range {
            StatsRange::Day => self.day = value,
            StatsRange::Week => self.week = value,
            StatsRange::Month => self.month = value,
            StatsRange::All => self.all = value,
        }
    }
}

/// Followers growth of `range` over the next shorter range; none for 24h
pub fn followers_diff(range: StatsRange, followers: &RangeSet<FollowersRow>) -> Option<i64> {
    let previous = range.previous()?;
    let current = followers.get(range)?.followers_total_now?;
    let prev = followers.get(previous)?.followers_total_now?;
    Some(current - prev)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamerStats {
    pub channel_login: String,
    pub avatar_url: String,
    pub offline_image_url: Option<String>,
    pub is_live: bool,
    pub stream_title: Option<String>,
    pub stats: RangeSet<StatsRow>,
    pub followers: RangeSet<FollowersRow>,
    pub games: RangeSet<Vec<GameEntry>>,
}

/// Channel page: cached details plus the figures of the selected range
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamerStatsView {
    #[serde(flatten)]
    pub details: StreamerStats,
    pub range: &'static str,
    pub followers_diff: Option<i64>,
}

pub struct StatsService {
    db: Database,
    helix: Arc<HelixClient>,
    rows: TtlCache<Arc<Vec<StatsRow>>>,
    streamers: TtlCache<Arc<StreamerStats>>,
}

impl StatsService {
    pub fn new(
        db: Database,
        helix: Arc<HelixClient>,
        rows: TtlCache<Arc<Vec<StatsRow>>>,
        streamers: TtlCache<Arc<StreamerStats>>,
    ) -> Self {
        Self {
            db,
            helix,
            rows,
            streamers,
        }
    }

    /// Drop expired view rows and channel pages
    pub fn purge_expired(&self) -> usize {
        self.rows.purge_expired() + self.streamers.purge_expired()
    }

    async fn view_rows(&self, range: StatsRange) -> Result<Arc<Vec<StatsRow>>> {
        let key = format!("stats_{}", range.stats_view());
        if let Some(rows) = self.rows.get(&key) {
            return Ok(rows);
        }

        let rows = Arc::new(self.db.stats_rows(range).await?);
        tracing::debug!(view = %range.stats_view(), count = rows.len(), "Loaded stats view");
        self.rows.insert(key, Arc::clone(&rows));
        Ok(rows)
    }

    /// Listing page; read failures are logged and yield an empty page
    pub async fn page(&self, query: &StatsQuery) -> StatsPage {
        let loaded = async {
            let rows = self.view_rows(query.range).await?;
            let avatars = self.db.latest_avatars().await?;
            Ok::<_, ApiError>(build_page(&rows, &avatars, query))
        };

        match loaded.await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to load streamer statistics: {}", e);
                StatsPage::empty(query)
            }
        }
    }

    pub async fn streamer(&self, channel: &str, range: StatsRange) -> Result<StreamerStatsView> {
        let channel = channel.trim();
        if channel.is_empty() {
            return Err(ApiError::NotFound("Channel not specified".to_string()));
        }

        let key = format!("streamer_stats_{}", channel.to_lowercase());
        let details = match self.streamers.get(&key) {
            Some(details) => details,
            None => {
                let details = Arc::new(self.load_streamer(channel).await?);
                self.streamers.insert(key, Arc::clone(&details));
                details
            }
        };

        Ok(StreamerStatsView {
            followers_diff: followers_diff(range, &details.followers),
            details: (*details).clone(),
            range: range.as_str(),
        })
    }

    async fn load_streamer(&self, channel: &str) -> Result<StreamerStats> {
        let user = match self.helix.get_user_by_login(channel).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(channel = %channel, "Helix user lookup failed: {}", e);
                None
            }
        };
        let stream = match self.helix.get_stream_by_login(channel).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(channel = %channel, "Helix stream lookup failed: {}", e);
                None
            }
        };

        let mut details = StreamerStats {
            channel_login: channel.to_string(),
            avatar_url: user
                .as_ref()
                .and_then(|u| u.profile_image_url.clone())
                .unwrap_or_else(|| AVATAR_PLACEHOLDER.to_string()),
            offline_image_url: user.and_then(|u| u.offline_image_url),
            is_live: stream.is_some(),
            stream_title: stream.map(|s| s.title),
            stats: RangeSet::default(),
            followers: RangeSet::default(),
            games: RangeSet::default(),
        };

        for range in StatsRange::ALL {
            details
                .stats
                .set(range, self.db.stats_for_channel(range, channel).await?);
            details
                .followers
                .set(range, self.db.followers_for_channel(range, channel).await?);
            let games = self.db.games_for_channel(range, channel).await?;
            details
                .games
                .set(range, games.map(|g| parse_game_list(&g)));
        }

        Ok(details)
    }
}
