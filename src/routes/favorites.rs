// Per-user favorite clips

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::models::favorites::{FavoriteInput, FavoritesPage};
use crate::session::Session;

const DEFAULT_PAGE_SIZE: i64 = 24;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ListParams {
    page: Option<i64>,
    page_size: Option<i64>,
}

/// GET /api/favorites/ids
pub(super) async fn ids_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.favorite_ids(&session.user_id).await?))
}

/// POST /api/favorites/toggle - Add or remove one clip
pub(super) async fn toggle_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(input): Json<FavoriteInput>,
) -> Result<Json<Value>, ApiError> {
    if input.clip_id.trim().is_empty() {
        return Err(ApiError::ValidationError("clipId is required".to_string()));
    }

    let is_favorite = state.db.toggle_favorite(&session.user_id, input).await?;
    Ok(Json(json!({ "isFavorite": is_favorite })))
}

/// GET /api/favorites - Newest first
pub(super) async fn list_handler(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<ListParams>,
) -> Result<Json<FavoritesPage>, ApiError> {
    let page = params.page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE) as u32;

    Ok(Json(
        state
            .db
            .favorites_page(&session.user_id, page, page_size)
            .await?,
    ))
}
