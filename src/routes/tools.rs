// Streamer search and user lookup

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::models::helix::StreamerResult;

const MIN_TERM_LEN: usize = 3;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    term: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LookupParams {
    login: Option<String>,
}

fn effective_limit(limit: Option<i64>) -> u32 {
    match limit {
        Some(n) if (1..=MAX_LIMIT as i64).contains(&n) => n as u32,
        _ => DEFAULT_LIMIT,
    }
}

/// GET /api/streamers/search - Channel search for the autocomplete box
///
/// Failures are logged and answered with an empty list.
pub(super) async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<StreamerResult>> {
    let term = params.term.unwrap_or_default();
    let term = term.trim();
    if term.chars().count() < MIN_TERM_LEN {
        return Json(Vec::new());
    }

    match state
        .helix
        .search_channels(term, effective_limit(params.limit))
        .await
    {
        Ok(results) => Json(results),
        Err(e) => {
            tracing::error!(term = %term, "Streamer search failed: {}", e);
            Json(Vec::new())
        }
    }
}

/// GET /api/users/lookup - Twitch user id for a login
pub(super) async fn lookup_handler(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Value>, ApiError> {
    let login = params
        .login
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ApiError::ValidationError("login is required".to_string()))?;

    match state.helix.get_user_id_by_name(login).await? {
        Some(id) => Ok(Json(json!({ "id": id }))),
        None => Err(ApiError::NotFound(format!("User '{}' not found", login))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::api_routes;
    use super::*;
    use crate::auth::Credential;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use chrono::{Duration, Utc};
    use mockito::Matcher;
    use tower::ServiceExt;

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn state_with_token(base: &str) -> AppState {
        let state = AppState::for_testing(base);
        state.auth_manager.store().set(Credential {
            access_token: "app-token".to_string(),
            refresh_token: String::new(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        });
        state
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None), 10);
        assert_eq!(effective_limit(Some(0)), 10);
        assert_eq!(effective_limit(Some(51)), 10);
        assert_eq!(effective_limit(Some(-1)), 10);
        assert_eq!(effective_limit(Some(1)), 1);
        assert_eq!(effective_limit(Some(50)), 50);
    }

    #[tokio::test]
    async fn test_search_short_term_skips_helix() {
        let mut server = mockito::Server::new_async().await;
        let search = server
            .mock("GET", "/helix/search/channels")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let response = api_routes(state_with_token(&server.url()))
            .oneshot(
                Request::builder()
                    .uri("/api/streamers/search?term=ab")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!([]));
        search.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_sorted_by_viewers() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/helix/search/channels")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "chess".into()),
                Matcher::UrlEncoded("first".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"data":[
                    {"broadcaster_login":"small","display_name":"Small","thumbnail_url":"https://img/s.png","viewer_count":5},
                    {"broadcaster_login":"big","display_name":"Big","thumbnail_url":"https://img/b.png","viewer_count":500}
                ]}"#,
            )
            .create_async()
            .await;

        let response = api_routes(state_with_token(&server.url()))
            .oneshot(
                Request::builder()
                    .uri("/api/streamers/search?term=chess&limit=99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body[0]["login"], "big");
        assert_eq!(body[0]["viewerCount"], 500);
        assert_eq!(body[1]["login"], "small");
    }

    #[tokio::test]
    async fn test_search_upstream_failure_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/helix/search/channels")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"bad"}"#)
            .create_async()
            .await;

        let response = api_routes(state_with_token(&server.url()))
            .oneshot(
                Request::builder()
                    .uri("/api/streamers/search?term=chess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_lookup() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/helix/users")
            .match_query(Matcher::UrlEncoded("login".into(), "twitchdev".into()))
            .with_status(200)
            .with_body(r#"{"data":[{"id":"141981764","login":"twitchdev","display_name":"TwitchDev"}]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/helix/users")
            .match_query(Matcher::UrlEncoded("login".into(), "ghost".into()))
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let app = api_routes(state_with_token(&server.url()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/users/lookup?login=twitchdev")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(json_body(response).await["id"], "141981764");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/users/lookup?login=ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/users/lookup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
