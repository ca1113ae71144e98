use anyhow::{Context, Result};
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::grants::{self, OAuthSettings};
use super::store::TokenStore;
use super::types::{Credential, UserInfo};
use crate::error::TwitchError;
use crate::models::helix::{HelixResponse, HelixUser};

/// Authentication manager
/// Obtains Twitch credentials through one of three grants and publishes them
/// to the shared [`TokenStore`].
pub struct AuthManager {
    /// Single source of truth for the current credential
    store: Arc<TokenStore>,

    /// Serializes provider round-trips so concurrent callers share one result.
    /// Held across the network call; the store's own lock is not.
    acquire_lock: Mutex<()>,

    /// HTTP client for token and user-info requests
    client: Client,

    settings: OAuthSettings,
}

impl AuthManager {
    /// Create a new AuthManager with an empty store
    pub fn new(settings: OAuthSettings, request_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_store(Arc::new(TokenStore::new()), settings, client))
    }

    pub fn with_store(store: Arc<TokenStore>, settings: OAuthSettings, client: Client) -> Self {
        Self {
            store,
            acquire_lock: Mutex::new(()),
            client,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Current usable credential, if any.
    ///
    /// Never starts an acquisition: which grant to use depends on whether the
    /// caller has a user session.
    pub fn ensure_token(&self) -> Option<Arc<Credential>> {
        self.store.get()
    }

    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    /// Drop the current credential (logout)
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Publish to the store, then hand the stored value back to the caller
    fn publish(&self, credential: Credential) -> Arc<Credential> {
        self.store.set(credential)
    }

    /// Authorization-code exchange for a user login
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Arc<Credential>, TwitchError> {
        let credential =
            grants::exchange_authorization_code(&self.client, &self.settings, code, redirect_uri)
                .await?;

        // Wait for any in-flight app grant so it cannot overwrite the user token
        let _guard = self.acquire_lock.lock().await;
        Ok(self.publish(credential))
    }

    /// Rotate `held`'s refresh token. The result is published only if `held`
    /// is still the stored credential; a logout during the exchange wins.
    /// Caller holds the acquisition guard.
    async fn rotate(
        &self,
        held: &Arc<Credential>,
    ) -> Result<Option<Arc<Credential>>, TwitchError> {
        let fresh =
            grants::exchange_refresh_token(&self.client, &self.settings, &held.refresh_token)
                .await?;

        let published = self.store.replace_if_current(held, fresh);
        if published.is_none() {
            tracing::info!("Credential changed during refresh, discarding rotated token");
        }
        Ok(published)
    }

    /// Refresh-token exchange.
    ///
    /// Returns `Ok(None)` without touching the store when there is nothing to
    /// refresh (no credential, or an app token without a refresh token).
    pub async fn refresh(&self) -> Result<Option<Arc<Credential>>, TwitchError> {
        let seen = match self.store.last_known() {
            Some(cred) if cred.can_refresh() => cred,
            Some(_) => {
                tracing::debug!("Held credential has no refresh token, skipping refresh");
                return Ok(None);
            }
            None => return Ok(None),
        };

        let _guard = self.acquire_lock.lock().await;

        let current = match self.store.last_known() {
            Some(cred) => cred,
            None => return Ok(None),
        };
        if !Arc::ptr_eq(&current, &seen) {
            // Replaced while we waited for the guard
            return Ok(Some(current));
        }

        tracing::debug!("Refreshing Twitch access token...");
        match self.rotate(&current).await? {
            Some(fresh) => Ok(Some(fresh)),
            None => Ok(self.store.last_known()),
        }
    }

    /// Current credential, or a replacement acquired once for all waiting callers.
    ///
    /// An expired credential that still has a refresh token is rotated first;
    /// the app grant is the fallback.
    pub async fn ensure_app_token(&self) -> Result<Arc<Credential>, TwitchError> {
        if let Some(cred) = self.store.get() {
            return Ok(cred);
        }

        let _guard = self.acquire_lock.lock().await;

        if let Some(cred) = self.store.get() {
            tracing::debug!("Credential published by a concurrent acquisition");
            return Ok(cred);
        }

        if let Some(held) = self.store.last_known().filter(|c| c.can_refresh()) {
            tracing::info!("Twitch user token expired, refreshing...");
            match self.rotate(&held).await {
                Ok(Some(fresh)) => return Ok(fresh),
                Ok(None) => {}
                Err(e) => tracing::warn!("Token refresh failed, using app grant: {}", e),
            }
        }

        tracing::info!("No usable Twitch token, requesting app token...");
        let credential = grants::request_app_token(&self.client, &self.settings).await?;
        Ok(self.publish(credential))
    }

    /// Replace a token the resource API rejected.
    ///
    /// Refreshes when a refresh token is held, otherwise falls back to the app
    /// grant. If another caller already replaced `rejected`, its result is reused.
    pub async fn reacquire(&self, rejected: &Credential) -> Result<Arc<Credential>, TwitchError> {
        let _guard = self.acquire_lock.lock().await;

        let current = self.store.last_known();
        if let Some(cred) = current.as_ref() {
            if cred.access_token != rejected.access_token && !cred.is_expired() {
                return Ok(Arc::clone(cred));
            }
        }

        if let Some(cred) = current.filter(|c| c.can_refresh()) {
            match self.rotate(&cred).await {
                Ok(Some(fresh)) => return Ok(fresh),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Refresh after rejected token failed, using app grant: {}", e);
                }
            }
        }

        let credential = grants::request_app_token(&self.client, &self.settings).await?;
        Ok(self.publish(credential))
    }

    /// Twitch login page for the authorization-code flow
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.settings.authorize_url(),
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", self.settings.scopes.as_str()),
                ("state", state),
            ],
        )
        .context("Invalid Twitch authorize URL")
    }

    /// Profile of the user owning `access_token`.
    ///
    /// Takes the token explicitly so it works for a just-exchanged login token
    /// as well as the stored one. An empty `data` array is reported as
    /// `MalformedResponse` and means "no such user".
    pub async fn get_user_info(&self, access_token: &str) -> Result<UserInfo, TwitchError> {
        let url = self.settings.helix_url("users");

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .header("Client-Id", &self.settings.client_id)
            .send()
            .await
            .map_err(|e| TwitchError::upstream_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TwitchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TwitchError::upstream_transport(&e))?;
        let users: HelixResponse<HelixUser> = serde_json::from_str(&body)
            .map_err(|e| TwitchError::MalformedResponse(format!("users response: {}", e)))?;

        let user = users.first().ok_or_else(|| {
            TwitchError::MalformedResponse("users response has empty data".to_string())
        })?;

        Ok(UserInfo {
            id: user.id,
            display_name: user.display_name,
            avatar_url: user.profile_image_url.unwrap_or_default(),
        })
    }
}
