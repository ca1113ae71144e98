// HTTP routes and shared application state

mod auth;
mod clips;
mod favorites;
mod stats;
mod tools;

use axum::{
    extract::State,
    middleware::{self as axum_middleware},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::AuthManager;
use crate::cache::TtlCache;
use crate::clips::ClipService;
use crate::config::Config;
use crate::db::Database;
use crate::download::Downloader;
use crate::helix::HelixClient;
use crate::middleware;
use crate::session::SessionStore;
use crate::stats::StatsService;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-channel statistics are cached for a minute
const STREAMER_CACHE_TTL: Duration = Duration::from_secs(60);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth_manager: Arc<AuthManager>,
    pub helix: Arc<HelixClient>,
    pub clips: Arc<ClipService>,
    pub stats: Arc<StatsService>,
    pub db: Database,
    pub sessions: SessionStore,
    pub downloader: Arc<Downloader>,
}

impl AppState {
    /// Wire every service from configuration
    pub fn new(config: Config, db: Database) -> anyhow::Result<Self> {
        let auth_manager = Arc::new(AuthManager::new(
            config.oauth_settings(),
            config.http_request_timeout,
        )?);
        let helix = Arc::new(HelixClient::new(
            Arc::clone(&auth_manager),
            config.http_request_timeout,
            config.http_max_retries,
        )?);

        let clips = Arc::new(ClipService::new(
            Arc::clone(&helix),
            TtlCache::new(Duration::from_secs(config.clip_cache_ttl)),
        ));
        let stats = Arc::new(StatsService::new(
            db.clone(),
            Arc::clone(&helix),
            TtlCache::new(Duration::from_secs(config.stats_cache_ttl)),
            TtlCache::new(STREAMER_CACHE_TTL),
        ));
        let downloader = Arc::new(Downloader::new(
            config.download_command.clone(),
            config.download_script.clone(),
            config.download_dir.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            auth_manager,
            helix,
            clips,
            stats,
            db,
            sessions: SessionStore::new(),
            downloader,
        })
    }

    /// Evict expired sessions and cache entries; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        let sessions = self.sessions.purge_expired();
        let cached = self.clips.purge_expired() + self.stats.purge_expired();
        if sessions + cached > 0 {
            tracing::debug!(sessions, cached, "Purged expired entries");
        }
        sessions + cached
    }

    /// Purge on every `interval` until `shutdown` flips to true or its sender is dropped
    pub fn spawn_purge(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        state.purge_expired();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// State pointing both Twitch endpoints at `base_url`, with an in-memory database
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(base_url: &str) -> Self {
        let config = Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            twitch_client_id: "test-client-id".to_string(),
            twitch_client_secret: "test-client-secret".to_string(),
            twitch_redirect_uri: "http://localhost:8000/auth/twitch/callback".to_string(),
            twitch_scopes: "user:read:email".to_string(),
            twitch_id_url: base_url.to_string(),
            twitch_helix_url: format!("{}/helix", base_url),
            database_file: std::path::PathBuf::from(":memory:"),
            http_request_timeout: 5,
            http_max_retries: 0,
            token_sweep_interval: 120,
            clip_cache_ttl: 300,
            stats_cache_ttl: 120,
            download_command: "sh".to_string(),
            download_script: std::path::PathBuf::from("download.sh"),
            download_dir: std::env::temp_dir().join("twitch-stat-clips-test"),
            log_level: "debug".to_string(),
        };
        let db = Database::open_in_memory().expect("in-memory database");
        Self::new(config, db).expect("test state")
    }
}

/// Health check routes (no session required)
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Login flow routes
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/twitch/login", get(auth::login_handler))
        .route("/auth/twitch/callback", get(auth::callback_handler))
        .route("/auth/twitch/logout", get(auth::logout_handler))
        .route("/auth/twitch/whoami", get(auth::whoami_handler))
        .with_state(state)
}

/// Public dashboard API routes
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/clips", get(clips::clips_handler))
        .route("/api/games/top", get(clips::top_games_handler))
        .route("/api/clips/download", post(clips::download_handler))
        .route("/api/clips/download/:file", get(clips::download_file_handler))
        .route("/api/stats/:channel", get(stats::streamer_stats_handler))
        .route("/api/streamers/search", get(tools::search_handler))
        .route("/api/users/lookup", get(tools::lookup_handler))
        .with_state(state)
}

/// Routes for logged-in users (session cookie required)
pub fn session_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/favorites", get(favorites::list_handler))
        .route("/api/favorites/ids", get(favorites::ids_handler))
        .route("/api/favorites/toggle", post(favorites::toggle_handler))
        .route("/api/stats", get(stats::stats_page_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ))
        .with_state(state)
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "TwitchStatClips is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
///
/// Reports whether a usable Twitch token is currently held.
async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
        "tokenAvailable": state.auth_manager.is_available()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;

    #[tokio::test]
    async fn test_root_handler() {
        let value = root_handler().await.0;

        assert_eq!(value["status"], "ok");
        assert_eq!(value["message"], "TwitchStatClips is running");
        assert_eq!(value["version"], VERSION);
    }

    #[tokio::test]
    async fn test_purge_keeps_live_sessions() {
        let state = AppState::for_testing("http://127.0.0.1:9");
        let user = crate::auth::UserInfo {
            id: "1".to_string(),
            display_name: "Viewer".to_string(),
            avatar_url: String::new(),
        };
        let id = state.sessions.create(&user);
        state.sessions.create(&user);

        assert_eq!(state.purge_expired(), 0);
        assert_eq!(state.sessions.len(), 2);
        assert!(state.sessions.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_purge_task_stops_on_shutdown() {
        let state = AppState::for_testing("http://127.0.0.1:9");
        let (tx, rx) = watch::channel(false);
        let task = state.spawn_purge(Duration::from_millis(5), rx);

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_health_handler_reports_token() {
        let state = AppState::for_testing("http://127.0.0.1:9");

        let value = health_handler(State(state.clone())).await.0;
        assert_eq!(value["status"], "healthy");
        assert!(value["timestamp"].is_string());
        assert_eq!(value["tokenAvailable"], false);

        state.auth_manager.store().set(Credential {
            access_token: "tok".to_string(),
            refresh_token: String::new(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        });
        let value = health_handler(State(state)).await.0;
        assert_eq!(value["tokenAvailable"], true);
    }
}
