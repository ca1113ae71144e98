// Cookie sessions for logged-in users and the OAuth state cookie

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::auth::UserInfo;

pub const SESSION_COOKIE: &str = "twitchstat.auth";
pub const STATE_COOKIE: &str = "twitch_oauth_state";

pub const SESSION_TTL_DAYS: i64 = 30;
const STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: String,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session table keyed by random cookie value
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its cookie value
    pub fn create(&self, user: &UserInfo) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                user_id: user.id.clone(),
                display_name: user.display_name.clone(),
                avatar_url: user.avatar_url.clone(),
                expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
            },
        );
        tracing::info!(user_id = %user.id, "Session created for {}", user.display_name);
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let session = self.sessions.get(id)?.clone();
        if session.expires_at <= Utc::now() {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Drop every expired session
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        let now = Utc::now();
        self.sessions.retain(|_, session| session.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    /// Session named by the request's session cookie
    pub fn session_for(&self, headers: &HeaderMap) -> Option<Session> {
        cookie_value(headers, SESSION_COOKIE).and_then(|id| self.get(&id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn build_cookie(name: &str, value: &str, max_age_secs: i64) -> HeaderValue {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    // Names are constants and values are uuids or empty
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

pub fn session_cookie(id: &str) -> HeaderValue {
    build_cookie(SESSION_COOKIE, id, SESSION_TTL_DAYS * 24 * 3600)
}

pub fn state_cookie(state: &str) -> HeaderValue {
    build_cookie(STATE_COOKIE, state, STATE_TTL_SECS)
}

pub fn expired_cookie(name: &str) -> HeaderValue {
    build_cookie(name, "", 0)
}
