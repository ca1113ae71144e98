// Session and CORS middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::routes::AppState;

/// Session-required middleware
///
/// Resolves the `twitchstat.auth` cookie to a live session and stores it in
/// the request extensions for handlers to extract.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(session) = state.sessions.session_for(request.headers()) {
        request.extensions_mut().insert(session);
        return Ok(next.run(request).await);
    }

    tracing::warn!(
        "Request without a valid session: {} {}",
        request.method(),
        request.uri().path()
    );
    Err(ApiError::Unauthenticated("Login required".to_string()))
}

/// Create CORS middleware layer
///
/// Allows all origins, methods, and headers; OPTIONS preflight is answered here.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
