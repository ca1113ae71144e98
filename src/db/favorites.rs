use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::favorites::{FavoriteClip, FavoriteInput, FavoritesPage};

impl Database {
    pub async fn favorite_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare("SELECT clip_id FROM favorites WHERE user_id = ?1")?;
            let ids = stmt
                .query_map([&user_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
        .await
    }

    /// Remove the favorite if present, add it otherwise. Returns the new state.
    pub async fn toggle_favorite(&self, user_id: &str, input: FavoriteInput) -> Result<bool> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM favorites WHERE user_id = ?1 AND clip_id = ?2",
                    params![user_id, input.clip_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                conn.execute("DELETE FROM favorites WHERE id = ?1", [id])?;
                tracing::debug!(user_id = %user_id, clip_id = %input.clip_id, "Favorite removed");
                return Ok(false);
            }

            let inserted = conn.execute(
                "INSERT INTO favorites
                    (user_id, clip_id, title, thumbnail_url, broadcaster_name, embed_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user_id,
                    input.clip_id,
                    input.title.unwrap_or_default(),
                    input.thumbnail_url.unwrap_or_default(),
                    input.broadcaster_name.unwrap_or_default(),
                    input.embed_url.unwrap_or_default(),
                    Utc::now(),
                ],
            );

            match inserted {
                Ok(_) => Ok(true),
                // A concurrent toggle added it first
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(true)
                }
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Newest first. `page` is 1-based.
    pub async fn favorites_page(
        &self,
        user_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<FavoritesPage> {
        let user_id = user_id.to_string();
        let offset = i64::from(page.max(1) - 1) * i64::from(page_size);
        let limit = i64::from(page_size);

        self.call(move |conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM favorites WHERE user_id = ?1",
                [&user_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT clip_id, title, thumbnail_url, broadcaster_name, embed_url, created_at
                 FROM favorites
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let items = stmt
                .query_map(params![user_id, limit, offset], |row| {
                    Ok(FavoriteClip {
                        clip_id: row.get(0)?,
                        title: row.get(1)?,
                        thumbnail_url: row.get(2)?,
                        broadcaster_name: row.get(3)?,
                        embed_url: row.get(4)?,
                        created_at: row.get::<_, DateTime<Utc>>(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(FavoritesPage { total, items })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(clip_id: &str) -> FavoriteInput {
        FavoriteInput {
            clip_id: clip_id.to_string(),
            title: Some(format!("title {}", clip_id)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let db = Database::open_in_memory().unwrap();

        assert!(db.toggle_favorite("u1", input("clipA")).await.unwrap());
        assert_eq!(db.favorite_ids("u1").await.unwrap(), vec!["clipA"]);

        assert!(!db.toggle_favorite("u1", input("clipA")).await.unwrap());
        assert!(db.favorite_ids("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorites_are_per_user() {
        let db = Database::open_in_memory().unwrap();
        db.toggle_favorite("u1", input("clipA")).await.unwrap();
        db.toggle_favorite("u2", input("clipB")).await.unwrap();

        assert_eq!(db.favorite_ids("u1").await.unwrap(), vec!["clipA"]);
        assert_eq!(db.favorite_ids("u2").await.unwrap(), vec!["clipB"]);
    }

    #[tokio::test]
    async fn test_page_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for id in ["a", "b", "c"] {
            db.toggle_favorite("u1", input(id)).await.unwrap();
        }

        let page = db.favorites_page("u1", 1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|f| f.clip_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(page.items[0].title, "title c");
        assert_eq!(page.items[0].embed_url, "");

        let rest = db.favorites_page("u1", 2, 2).await.unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].clip_id, "a");
    }

    #[tokio::test]
    async fn test_reopened_file_keeps_favorites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites.sqlite3");

        {
            let db = Database::open(&path).unwrap();
            db.toggle_favorite("u1", input("clipA")).await.unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.favorite_ids("u1").await.unwrap(), vec!["clipA"]);
    }
}
