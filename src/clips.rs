// Paged clip browsing over cached Helix batches

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::error::{ApiError, Result};
use crate::helix::HelixClient;
use crate::models::helix::{Clip, HelixGame};

/// Clips fetched from Helix per cached batch
pub const BATCH_SIZE: u32 = 100;

/// Pages served from one batch before the next key is used
const PAGES_PER_BATCH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPeriod {
    Day,
    Week,
    Month,
    All,
}

impl ClipPeriod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(ClipPeriod::Day),
            "week" => Some(ClipPeriod::Week),
            "month" => Some(ClipPeriod::Month),
            "all" => Some(ClipPeriod::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClipPeriod::Day => "day",
            ClipPeriod::Week => "week",
            ClipPeriod::Month => "month",
            ClipPeriod::All => "all",
        }
    }

    /// Lower bound for `started_at`, `None` for all time
    pub fn started_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ClipPeriod::Day => Some(now - Duration::days(1)),
            ClipPeriod::Week => Some(now - Duration::days(7)),
            ClipPeriod::Month => now.checked_sub_months(Months::new(1)),
            ClipPeriod::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipPage {
    pub clips: Vec<Clip>,
    pub has_more: bool,
}

pub fn batch_key(game_id: &str, period: ClipPeriod, page: u32) -> String {
    format!(
        "clips_{}_{}_batch_{}",
        game_id,
        period.as_str(),
        page.saturating_sub(1) / PAGES_PER_BATCH
    )
}

/// Cut one page out of a batch. `page` is 1-based.
pub fn slice_page(batch: &[Clip], page: u32, page_size: u32) -> ClipPage {
    let page = page.max(1) as usize;
    let page_size = page_size as usize;

    let clips = batch
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    ClipPage {
        clips,
        has_more: page * page_size < batch.len(),
    }
}

pub struct ClipService {
    helix: Arc<HelixClient>,
    batches: TtlCache<Arc<Vec<Clip>>>,
}

impl ClipService {
    pub fn new(helix: Arc<HelixClient>, batches: TtlCache<Arc<Vec<Clip>>>) -> Self {
        Self { helix, batches }
    }

    pub fn purge_expired(&self) -> usize {
        self.batches.purge_expired()
    }

    pub async fn top_games(&self) -> Result<Vec<HelixGame>> {
        Ok(self.helix.get_top_games().await?)
    }

    pub async fn page(
        &self,
        game_name: &str,
        period: ClipPeriod,
        page: u32,
        page_size: u32,
    ) -> Result<ClipPage> {
        let game_id = self
            .helix
            .get_game_id_by_name(game_name)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Game '{}' not found", game_name)))?;

        let key = batch_key(&game_id, period, page);
        let batch = match self.batches.get(&key) {
            Some(batch) => {
                tracing::debug!(key = %key, "Clip batch cache hit");
                batch
            }
            None => {
                let clips = self
                    .helix
                    .get_clips_by_game(&game_id, period, BATCH_SIZE)
                    .await?;
                tracing::debug!(key = %key, count = clips.len(), "Fetched clip batch");
                let batch = Arc::new(clips);
                self.batches.insert(key, Arc::clone(&batch));
                batch
            }
        };

        Ok(slice_page(&batch, page, page_size))
    }
}
