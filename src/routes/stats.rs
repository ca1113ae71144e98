// Streamer statistics handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;
use crate::stats::{StatsPage, StatsParams, StatsQuery, StatsRange, StreamerStatsView};

#[derive(Debug, Deserialize)]
pub(super) struct RangeParams {
    range: Option<String>,
}

/// GET /api/stats - Filtered, sorted listing of one range
pub(super) async fn stats_page_handler(
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Json<StatsPage> {
    let query = StatsQuery::from(params);
    Json(state.stats.page(&query).await)
}

/// GET /api/stats/:channel - Channel page with every range
pub(super) async fn streamer_stats_handler(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<StreamerStatsView>, ApiError> {
    let range = StatsRange::parse(params.range.as_deref().unwrap_or("24h"));
    Ok(Json(state.stats.streamer(&channel, range).await?))
}

#[cfg(test)]
mod tests {
    use super::super::{api_routes, session_routes};
    use super::*;
    use crate::auth::UserInfo;
    use crate::session::SESSION_COOKIE;
    use crate::stats::AVATAR_PLACEHOLDER;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn seeded_state() -> AppState {
        let state = AppState::for_testing("http://127.0.0.1:9");
        state.db.create_stats_fixtures().await.unwrap();
        state
            .db
            .insert_stats_fixture(StatsRange::Week, "alpha", 120.0, 300, 50.0, Some(900), Some("en"), Some("Chess"))
            .await
            .unwrap();
        state
            .db
            .insert_stats_fixture(StatsRange::Week, "beta", 80.0, 100, 20.0, Some(100), Some("pl"), Some("Minecraft"))
            .await
            .unwrap();
        state
            .db
            .insert_avatar_fixture("alpha", "https://img/alpha.png")
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_stats_listing_requires_session() {
        let app = session_routes(seeded_state().await);
        let response = app
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stats_listing_filters_and_attaches_avatars() {
        let state = seeded_state().await;
        let session = state.sessions.create(&UserInfo {
            id: "1".to_string(),
            display_name: "Viewer".to_string(),
            avatar_url: String::new(),
        });

        let response = session_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/api/stats?range=7d&language=en")
                    .header("cookie", format!("{}={}", SESSION_COOKIE, session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = json_body(response).await;
        assert_eq!(page["range"], "7d");
        assert_eq!(page["totalItems"], 1);
        assert_eq!(page["items"][0]["channelLogin"], "alpha");
        assert_eq!(page["items"][0]["avatarUrl"], "https://img/alpha.png");
        assert_eq!(page["languageOptions"], serde_json::json!(["en", "pl"]));
    }

    #[tokio::test]
    async fn test_streamer_page_degrades_without_helix() {
        let state = seeded_state().await;
        state
            .db
            .insert_followers_fixture(StatsRange::Day, "alpha", Some(900))
            .await
            .unwrap();
        state
            .db
            .insert_followers_fixture(StatsRange::Week, "alpha", Some(950))
            .await
            .unwrap();
        state
            .db
            .insert_games_fixture(StatsRange::Week, "alpha", "Chess (120m), Just Chatting (30m)")
            .await
            .unwrap();

        let response = api_routes(state)
            .oneshot(
                Request::builder()
                    .uri("/api/stats/alpha?range=7d")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["channelLogin"], "alpha");
        assert_eq!(body["avatarUrl"], AVATAR_PLACEHOLDER);
        assert_eq!(body["isLive"], false);
        assert_eq!(body["range"], "7d");
        assert_eq!(body["followersDiff"], 50);
        assert_eq!(body["games"]["7d"][0]["name"], "Chess");
        assert_eq!(body["games"]["7d"][0]["minutes"], 120);
        assert_eq!(body["stats"]["7d"]["maxViewers"], 300);
        assert!(body["stats"]["24h"].is_null());
    }
}
