use rusqlite::{OptionalExtension, Row};
use std::collections::HashMap;

use super::Database;
use crate::error::Result;
use crate::models::stats::{FollowersRow, StatsRow};
use crate::stats::StatsRange;

// View names come from `StatsRange`, never from request input.

const STATS_COLUMNS: &str = "ChannelLogin, AvgViewers, MaxViewers, MinutesStreamed, HoursWatched, \
     CurrentViewers, FollowersLatest, LastSeenAt, CurrentLanguage, CurrentGame";

const FOLLOWERS_COLUMNS: &str = "ChannelLogin, FollowersMax, FollowersMin, FollowersGained, \
     FirstBucket, LastBucket, FollowersTotalNow";

fn stats_row(row: &Row<'_>) -> rusqlite::Result<StatsRow> {
    Ok(StatsRow {
        channel_login: row.get(0)?,
        avg_viewers: row.get(1)?,
        max_viewers: row.get(2)?,
        minutes_streamed: row.get(3)?,
        hours_watched: row.get(4)?,
        current_viewers: row.get(5)?,
        followers_latest: row.get(6)?,
        last_seen_at: row.get(7)?,
        current_language: row.get(8)?,
        current_game: row.get(9)?,
        avatar_url: None,
    })
}

fn followers_row(row: &Row<'_>) -> rusqlite::Result<FollowersRow> {
    Ok(FollowersRow {
        channel_login: row.get(0)?,
        followers_max: row.get(1)?,
        followers_min: row.get(2)?,
        followers_gained: row.get(3)?,
        first_bucket: row.get(4)?,
        last_bucket: row.get(5)?,
        followers_total_now: row.get(6)?,
    })
}

impl Database {
    /// Every row of the range's stats view
    pub async fn stats_rows(&self, range: StatsRange) -> Result<Vec<StatsRow>> {
        let sql = format!("SELECT {} FROM {}", STATS_COLUMNS, range.stats_view());
        self.call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], stats_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn stats_for_channel(
        &self,
        range: StatsRange,
        channel: &str,
    ) -> Result<Option<StatsRow>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE ChannelLogin = ?1 LIMIT 1",
            STATS_COLUMNS,
            range.stats_view()
        );
        let channel = channel.to_string();
        self.call(move |conn| conn.query_row(&sql, [&channel], stats_row).optional())
            .await
    }

    pub async fn followers_for_channel(
        &self,
        range: StatsRange,
        channel: &str,
    ) -> Result<Option<FollowersRow>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE ChannelLogin = ?1 LIMIT 1",
            FOLLOWERS_COLUMNS,
            range.followers_view()
        );
        let channel = channel.to_string();
        self.call(move |conn| conn.query_row(&sql, [&channel], followers_row).optional())
            .await
    }

    /// Raw games column, e.g. `"Just Chatting (336m), Fortnite (12m)"`
    pub async fn games_for_channel(
        &self,
        range: StatsRange,
        channel: &str,
    ) -> Result<Option<String>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE ChannelLogin = ?1 LIMIT 1",
            range.games_column(),
            range.games_view()
        );
        let channel = channel.to_string();
        self.call(move |conn| {
            conn.query_row(&sql, [&channel], |row| row.get::<_, Option<String>>(0))
                .optional()
                .map(Option::flatten)
        })
        .await
    }

    /// Channel login to latest known avatar URL
    pub async fn latest_avatars(&self) -> Result<HashMap<String, String>> {
        self.call(|conn| {
            let mut stmt =
                conn.prepare("SELECT ChannelLogin, AvatarUrl FROM LatestAvatarPerChannel")?;
            let avatars = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<HashMap<String, String>>>()?;
            Ok(avatars)
        })
        .await
    }
}

/// Test fixtures standing in for the views the collector scripts maintain
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    use super::*;
    use rusqlite::params;

    pub const VIEWS_SCHEMA: &str = "
        CREATE TABLE IF NOT EXISTS LatestAvatarPerChannel (
            ChannelLogin TEXT, AvatarUrl TEXT, LastSeenAtUtc TEXT
        );
    ";

    impl Database {
        /// Create every stats view as a plain table
        pub async fn create_stats_fixtures(&self) -> Result<()> {
            self.call(|conn| {
                conn.execute_batch(VIEWS_SCHEMA)?;
                for range in StatsRange::ALL {
                    conn.execute_batch(&format!(
                        "CREATE TABLE IF NOT EXISTS {} (
                            ChannelLogin TEXT, AvgViewers REAL, MaxViewers INTEGER,
                            MinutesStreamed INTEGER, HoursWatched REAL, CurrentViewers INTEGER,
                            FollowersLatest INTEGER, LastSeenAt TEXT, CurrentLanguage TEXT,
                            CurrentGame TEXT
                        );
                        CREATE TABLE IF NOT EXISTS {} (
                            ChannelLogin TEXT, FollowersMax INTEGER, FollowersMin INTEGER,
                            FollowersGained INTEGER, FirstBucket TEXT, LastBucket TEXT,
                            FollowersTotalNow INTEGER
                        );
                        CREATE TABLE IF NOT EXISTS {} (ChannelLogin TEXT, {} TEXT);",
                        range.stats_view(),
                        range.followers_view(),
                        range.games_view(),
                        range.games_column()
                    ))?;
                }
                Ok(())
            })
            .await
        }

        #[allow(clippy::too_many_arguments)]
        pub async fn insert_stats_fixture(
            &self,
            range: StatsRange,
            channel: &str,
            avg: f64,
            max: i64,
            hours: f64,
            followers: Option<i64>,
            language: Option<&str>,
            game: Option<&str>,
        ) -> Result<()> {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, 60, ?4, NULL, ?5, NULL, ?6, ?7)",
                range.stats_view(),
                STATS_COLUMNS
            );
            let channel = channel.to_string();
            let language = language.map(str::to_string);
            let game = game.map(str::to_string);
            self.call(move |conn| {
                conn.execute(
                    &sql,
                    params![channel, avg, max, hours, followers, language, game],
                )
                .map(|_| ())
            })
            .await
        }

        pub async fn insert_followers_fixture(
            &self,
            range: StatsRange,
            channel: &str,
            total_now: Option<i64>,
        ) -> Result<()> {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES (?1, 0, 0, 0, ?2, ?2, ?3)",
                range.followers_view(),
                FOLLOWERS_COLUMNS
            );
            let channel = channel.to_string();
            self.call(move |conn| {
                conn.execute(&sql, params![channel, chrono::Utc::now(), total_now])
                    .map(|_| ())
            })
            .await
        }

        pub async fn insert_games_fixture(
            &self,
            range: StatsRange,
            channel: &str,
            games: &str,
        ) -> Result<()> {
            let sql = format!(
                "INSERT INTO {} (ChannelLogin, {}) VALUES (?1, ?2)",
                range.games_view(),
                range.games_column()
            );
            let channel = channel.to_string();
            let games = games.to_string();
            self.call(move |conn| conn.execute(&sql, params![channel, games]).map(|_| ()))
                .await
        }

        pub async fn insert_avatar_fixture(&self, channel: &str, url: &str) -> Result<()> {
            let channel = channel.to_string();
            let url = url.to_string();
            self.call(move |conn| {
                conn.execute(
                    "INSERT INTO LatestAvatarPerChannel (ChannelLogin, AvatarUrl, LastSeenAtUtc)
                     VALUES (?1, ?2, NULL)",
                    params![channel, url],
                )
                .map(|_| ())
            })
            .await
        }
    }
}
