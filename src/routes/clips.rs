// Clip browsing and download handlers

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::clips::{ClipPage, ClipPeriod, BATCH_SIZE};
use crate::download::DownloadedClip;
use crate::error::ApiError;
use crate::models::helix::HelixGame;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClipsParams {
    game_name: Option<String>,
    period: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DownloadRequest {
    #[serde(default)]
    clip_url: String,
}

/// GET /api/clips - One page of a game's top clips
pub(super) async fn clips_handler(
    State(state): State<AppState>,
    Query(params): Query<ClipsParams>,
) -> Result<Json<ClipPage>, ApiError> {
    let game_name = params
        .game_name
        .as_deref()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::ValidationError("gameName is required".to_string()))?;

    let period = params
        .period
        .as_deref()
        .and_then(ClipPeriod::parse)
        .unwrap_or(ClipPeriod::Week);
    let page = params.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let page_size = params
        .page_size
        .unwrap_or(BATCH_SIZE as i64)
        .clamp(1, BATCH_SIZE as i64) as u32;

    tracing::debug!(
        game = %game_name,
        period = period.as_str(),
        page,
        page_size,
        "Clip page requested"
    );

    let page = state
        .clips
        .page(game_name, period, page, page_size)
        .await?;
    Ok(Json(page))
}

/// GET /api/games/top
pub(super) async fn top_games_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<HelixGame>>, ApiError> {
    Ok(Json(state.clips.top_games().await?))
}

/// POST /api/clips/download - Save a clip through the download script
pub(super) async fn download_handler(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<Json<DownloadedClip>, ApiError> {
    Ok(Json(state.downloader.download(&request.clip_url).await?))
}

/// GET /api/clips/download/:file - Serve a downloaded clip
pub(super) async fn download_file_handler(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.downloader.read(&file).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "video/mp4".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file),
            ),
        ],
        bytes,
    )
        .into_response())
}
