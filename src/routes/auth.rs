// Twitch login flow

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::{ApiError, TwitchError};
use crate::session::{self, SESSION_COOKIE, STATE_COOKIE};

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/twitch/login - Redirect to the Twitch consent page
pub(super) async fn login_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    let oauth_state = uuid::Uuid::new_v4().simple().to_string();
    let url = state.auth_manager.authorize_url(&oauth_state)?;

    tracing::debug!("Redirecting to Twitch login");
    let mut response = Redirect::to(url.as_str()).into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, session::state_cookie(&oauth_state));
    Ok(response)
}

/// GET /auth/twitch/callback - Finish the authorization-code flow
pub(super) async fn callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let expected = session::cookie_value(&headers, STATE_COOKIE);
    match (&params.state, &expected) {
        (Some(got), Some(want)) if !got.is_empty() && got == want => {}
        _ => {
            tracing::warn!("OAuth callback with missing or mismatched state");
            return Err(ApiError::InvalidState);
        }
    }

    if let Some(error) = params.error {
        tracing::warn!("Twitch login was declined: {}", error);
        return Err(ApiError::Unauthenticated(
            params.error_description.unwrap_or(error),
        ));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::ValidationError("Missing authorization code".to_string()))?;

    let redirect_uri = state.auth_manager.settings().redirect_uri.clone();
    let credential = state
        .auth_manager
        .exchange_code(&code, &redirect_uri)
        .await?;

    let user = match state
        .auth_manager
        .get_user_info(&credential.access_token)
        .await
    {
        Ok(user) => user,
        Err(TwitchError::MalformedResponse(message)) => {
            tracing::warn!("Login user lookup returned no user: {}", message);
            return Err(ApiError::NotFound("no such user".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let session_id = state.sessions.create(&user);
    tracing::info!("✅ {} logged in with Twitch", user.display_name);

    let target = format!("/?_={}", Utc::now().timestamp());
    let mut response = Redirect::to(&target).into_response();
    let headers = response.headers_mut();
    headers.append(header::SET_COOKIE, session::session_cookie(&session_id));
    headers.append(header::SET_COOKIE, session::expired_cookie(STATE_COOKIE));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    Ok(response)
}

/// GET /auth/twitch/logout - End the session and drop the held token
pub(super) async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session::cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.remove(&id);
    }
    state.auth_manager.clear();

    let mut response = Redirect::to("/").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, session::expired_cookie(SESSION_COOKIE));
    response
}

/// GET /auth/twitch/whoami - Current login state
pub(super) async fn whoami_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Value> {
    match state.sessions.session_for(&headers) {
        Some(session) => Json(json!({
            "isAuthenticated": true,
            "name": session.display_name,
            "id": session.user_id
        })),
        None => Json(json!({
            "isAuthenticated": false,
            "name": null,
            "id": null
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::super::auth_routes;
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use mockito::Matcher;
    use tower::ServiceExt;

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_login_sets_state_and_redirects() {
        let state = AppState::for_testing("https://id.example");
        let app = auth_routes(state);

        let response = app
            .oneshot(Request::builder().uri("/auth/twitch/login").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("https://id.example/oauth2/authorize?"));
        assert!(location.contains("response_type=code"));
        assert!(location.contains("client_id=test-client-id"));

        let cookies = set_cookies(&response);
        let state_cookie = cookies
            .iter()
            .find(|c| c.starts_with("twitch_oauth_state="))
            .unwrap();
        let value = state_cookie
            .trim_start_matches("twitch_oauth_state=")
            .split(';')
            .next()
            .unwrap();
        assert!(location.contains(&format!("state={}", value)));
    }

    #[tokio::test]
    async fn test_callback_rejects_state_mismatch() {
        let app = auth_routes(AppState::for_testing("http://127.0.0.1:9"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/twitch/callback?code=abc&state=forged")
                    .header("cookie", "twitch_oauth_state=expected")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_success_creates_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_body(
                r#"{"access_token":"user-at","refresh_token":"user-rt","expires_in":14400,"token_type":"bearer"}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/helix/users")
            .match_header("authorization", "Bearer user-at")
            .with_status(200)
            .with_body(r#"{"data":[{"id":"141981764","login":"twitchdev","display_name":"TwitchDev","profile_image_url":"https://img/dev.png"}]}"#)
            .create_async()
            .await;

        let state = AppState::for_testing(&server.url());
        let app = auth_routes(state.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/twitch/callback?code=abc&state=s1")
                    .header("cookie", "twitch_oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .starts_with("/?_="));
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("twitchstat.auth=")));
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(
            state.auth_manager.ensure_token().unwrap().refresh_token,
            "user-rt"
        );
    }

    #[tokio::test]
    async fn test_callback_exchange_failure_is_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"status":400,"message":"Invalid authorization code"}"#)
            .create_async()
            .await;

        let app = auth_routes(AppState::for_testing(&server.url()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/twitch/callback?code=bad&state=s1")
                    .header("cookie", "twitch_oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_callback_without_user_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(
                r#"{"access_token":"user-at","refresh_token":"user-rt","expires_in":14400,"token_type":"bearer"}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/helix/users")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let app = auth_routes(AppState::for_testing(&server.url()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/auth/twitch/callback?code=abc&state=s1")
                    .header("cookie", "twitch_oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_clears_session_and_token() {
        let state = AppState::for_testing("http://127.0.0.1:9");
        let id = state.sessions.create(&crate::auth::UserInfo {
            id: "1".to_string(),
            display_name: "A".to_string(),
            avatar_url: String::new(),
        });
        state.auth_manager.store().set(crate::auth::Credential {
            access_token: "tok".to_string(),
            refresh_token: "rt".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        });

        let response = auth_routes(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/auth/twitch/logout")
                    .header("cookie", format!("twitchstat.auth={}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(state.sessions.is_empty());
        assert!(!state.auth_manager.is_available());
    }

    #[tokio::test]
    async fn test_whoami() {
        let state = AppState::for_testing("http://127.0.0.1:9");

        let anonymous = whoami_handler(State(state.clone()), HeaderMap::new()).await.0;
        assert_eq!(anonymous["isAuthenticated"], false);
        assert!(anonymous["name"].is_null());

        let id = state.sessions.create(&crate::auth::UserInfo {
            id: "7".to_string(),
            display_name: "Seven".to_string(),
            avatar_url: String::new(),
        });
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("twitchstat.auth={}", id)).unwrap(),
        );
        let known = whoami_handler(State(state), headers).await.0;
        assert_eq!(known["isAuthenticated"], true);
        assert_eq!(known["name"], "Seven");
        assert_eq!(known["id"], "7");
    }
}
