// Error handling module
// Twitch error taxonomy and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the token lifecycle and the Helix client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TwitchError {
    /// Identity provider rejected a grant exchange (or the call never completed)
    #[error("Token exchange failed: {status} - {message}")]
    ExchangeFailed { status: u16, message: String },

    /// Expected JSON field absent or of the wrong shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Resource API returned a non-success status
    #[error("Twitch API error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// No credential held
    #[error("No Twitch credential available")]
    Unavailable,
}

impl TwitchError {
    /// Transport failures during a grant have no HTTP status; 0 marks them.
    pub fn exchange_transport(err: &reqwest::Error) -> Self {
        TwitchError::ExchangeFailed {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: if err.is_timeout() {
                "request timed out".to_string()
            } else {
                err.to_string()
            },
        }
    }

    pub fn upstream_transport(err: &reqwest::Error) -> Self {
        TwitchError::Upstream {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// No usable credential or session
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// OAuth state mismatch on callback
    #[error("Invalid OAuth state")]
    InvalidState,

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from the Twitch resource API
    #[error("Twitch API error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TwitchError> for ApiError {
    fn from(err: TwitchError) -> Self {
        match err {
            TwitchError::Unavailable => {
                ApiError::Unauthenticated("Twitch token unavailable".to_string())
            }
            TwitchError::ExchangeFailed { status, message } => ApiError::Unauthenticated(format!(
                "Token exchange failed ({}): {}",
                status, message
            )),
            TwitchError::Upstream { status: 401, message } => {
                ApiError::Unauthenticated(format!("Twitch rejected token: {}", message))
            }
            TwitchError::Upstream { status, message } => ApiError::Upstream { status, message },
            TwitchError::MalformedResponse(message) => ApiError::Upstream {
                status: 502,
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "auth_error", msg),
            ApiError::InvalidState => (
                StatusCode::BAD_REQUEST,
                "invalid_state",
                "Invalid state.".to_string(),
            ),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Upstream { status, message } => {
                tracing::warn!(status, "Twitch API call failed: {}", message);
                (StatusCode::BAD_GATEWAY, "upstream_error", message)
            }
            ApiError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
