// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth grant used to obtain a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantKind {
    /// User login via authorization code
    AuthorizationCode,

    /// Rotation of a previously issued refresh token
    RefreshToken,

    /// App token, no user context
    ClientCredentials,
}

impl GrantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantKind::AuthorizationCode => "authorization_code",
            GrantKind::RefreshToken => "refresh_token",
            GrantKind::ClientCredentials => "client_credentials",
        }
    }
}

/// Bearer credential issued by the identity provider.
///
/// Replaced as a whole; never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    pub access_token: String,
    /// Empty for app tokens
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build from a token endpoint response, anchoring expiry at `now`.
    ///
    /// `None` when `expires_in` does not fit a timestamp.
    pub fn from_response(data: TokenResponse, now: DateTime<Utc>) -> Option<Self> {
        let expires_at = Duration::try_seconds(data.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))?;

        Some(Self {
            access_token: data.access_token,
            refresh_token: data.refresh_token.unwrap_or_default(),
            token_type: data.token_type,
            expires_at,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// Short token prefix safe to put in logs
    pub fn redacted(&self) -> &str {
        match self.access_token.char_indices().nth(8) {
            Some((end, _)) => &self.access_token[..end],
            None => &self.access_token,
        }
    }
}

/// Token endpoint response (`POST /oauth2/token`)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
}

/// Profile of the user owning an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
    pub avatar_url: String,
}
