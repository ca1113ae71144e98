use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::clips::ClipPeriod;
use crate::error::TwitchError;
use crate::models::helix::{
    Clip, HelixChannel, HelixClip, HelixGame, HelixResponse, HelixStream, HelixUser,
    StreamerResult,
};

/// Twitch Helix client.
///
/// Borrows the current token from the [`AuthManager`] at call time (falling
/// back to an app token when nobody is logged in). A 401 triggers one
/// re-acquisition; 429 and 5xx are retried with exponential backoff.
pub struct HelixClient {
    client: Client,
    auth: Arc<AuthManager>,
    max_retries: u32,
    base_delay_ms: u64,
}

impl HelixClient {
    pub fn new(auth: Arc<AuthManager>, request_timeout: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth,
            max_retries,
            base_delay_ms: 500,
        })
    }

    /// Override the backoff base delay (tests use a tiny one)
    pub fn with_base_delay(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<HelixResponse<T>, TwitchError> {
        let url = self.auth.settings().helix_url(path);
        let client_id = self.auth.settings().client_id.clone();

        let mut token = self.auth.ensure_app_token().await?;
        let mut reauthenticated = false;
        let mut attempt = 0;

        loop {
            tracing::debug!(url = %url, attempt = attempt + 1, "Sending Helix request");

            let result = self
                .client
                .get(&url)
                .query(query)
                .bearer_auth(&token.access_token)
                .header("Client-Id", &client_id)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Helix request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    tracing::error!(url = %url, error = %e, "Helix request failed after all retries");
                    return Err(TwitchError::upstream_transport(&e));
                }
            };

            let status = response.status();
            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| TwitchError::upstream_transport(&e))?;
                return serde_json::from_str(&body).map_err(|e| {
                    TwitchError::MalformedResponse(format!("{} response: {}", path, e))
                });
            }

            match status.as_u16() {
                401 if !reauthenticated => {
                    tracing::warn!("Helix rejected token, re-acquiring and retrying...");
                    token = self.auth.reacquire(&token).await?;
                    reauthenticated = true;
                    continue;
                }
                429 | 500..=599 if attempt < self.max_retries => {
                    let delay = self.calculate_backoff_delay(attempt);
                    tracing::warn!(
                        "Received {}, retrying after {}ms (attempt {}/{})",
                        status,
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                    continue;
                }
                _ => {}
            }

            let message = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                response_body = %message,
                "Helix request failed with error response"
            );
            return Err(TwitchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
    }

    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms * 2_u64.pow(attempt)
    }

    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<HelixUser>, TwitchError> {
        let users = self
            .get::<HelixUser>("users", &[("login", login.to_string())])
            .await?;
        Ok(users.first())
    }

    pub async fn get_user_id_by_name(&self, login: &str) -> Result<Option<String>, TwitchError> {
        Ok(self.get_user_by_login(login).await?.map(|u| u.id))
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<HelixUser>, TwitchError> {
        let users = self
            .get::<HelixUser>("users", &[("id", id.to_string())])
            .await?;
        Ok(users.first())
    }

    /// Live stream of `login`, `None` when offline
    pub async fn get_stream_by_login(
        &self,
        login: &str,
    ) -> Result<Option<HelixStream>, TwitchError> {
        let streams = self
            .get::<HelixStream>("streams", &[("user_login", login.to_string())])
            .await?;
        Ok(streams.first())
    }

    pub async fn get_top_games(&self) -> Result<Vec<HelixGame>, TwitchError> {
        let games = self
            .get::<HelixGame>("games/top", &[("first", "50".to_string())])
            .await?;
        Ok(games.data)
    }

    pub async fn get_game_id_by_name(&self, name: &str) -> Result<Option<String>, TwitchError> {
        let games = self
            .get::<HelixGame>("games", &[("name", name.to_string())])
            .await?;
        Ok(games.first().map(|g| g.id))
    }

    pub async fn get_clips_by_broadcaster(
        &self,
        broadcaster_id: &str,
    ) -> Result<Vec<Clip>, TwitchError> {
        let clips = self
            .get::<HelixClip>(
                "clips",
                &[
                    ("broadcaster_id", broadcaster_id.to_string()),
                    ("first", "10".to_string()),
                ],
            )
            .await?;
        Ok(clips.data.into_iter().map(Clip::from).collect())
    }

    pub async fn get_clips_by_game(
        &self,
        game_id: &str,
        period: ClipPeriod,
        first: u32,
    ) -> Result<Vec<Clip>, TwitchError> {
        let mut query = vec![
            ("game_id", game_id.to_string()),
            ("first", first.to_string()),
        ];
        if let Some(started_at) = period.started_at(chrono::Utc::now()) {
            query.push((
                "started_at",
                started_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ));
        }

        let clips = self.get::<HelixClip>("clips", &query).await?;
        Ok(clips.data.into_iter().map(Clip::from).collect())
    }

    /// Channel search, most watched first
    pub async fn search_channels(
        &self,
        term: &str,
        limit: u32,
    ) -> Result<Vec<StreamerResult>, TwitchError> {
        let channels = self
            .get::<HelixChannel>(
                "search/channels",
                &[
                    ("query", term.to_string()),
                    ("first", limit.to_string()),
                    ("live_only", "false".to_string()),
                ],
            )
            .await?;

        let mut results: Vec<StreamerResult> =
            channels.data.into_iter().map(StreamerResult::from).collect();
        results.sort_by(|a, b| b.viewer_count.cmp(&a.viewer_count));
        Ok(results)
    }
}
