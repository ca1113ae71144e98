// Token endpoint exchanges

use chrono::Utc;
use reqwest::Client;

use super::types::{Credential, GrantKind, TokenResponse};
use crate::error::TwitchError;

/// Identity provider settings shared by all grants
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
    /// Base URL of the identity provider, e.g. `https://id.twitch.tv`
    pub id_base_url: String,
    /// Base URL of the resource API, e.g. `https://api.twitch.tv/helix`
    pub helix_base_url: String,
}

impl OAuthSettings {
    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.id_base_url.trim_end_matches('/'))
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/authorize", self.id_base_url.trim_end_matches('/'))
    }

    pub fn helix_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.helix_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Exchange an authorization code for a user credential
pub async fn exchange_authorization_code(
    client: &Client,
    settings: &OAuthSettings,
    code: &str,
    redirect_uri: &str,
) -> Result<Credential, TwitchError> {
    let form = [
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
        ("code", code),
        ("grant_type", GrantKind::AuthorizationCode.as_str()),
        ("redirect_uri", redirect_uri),
    ];

    post_token_form(client, settings, GrantKind::AuthorizationCode, &form).await
}

/// Rotate a refresh token
pub async fn exchange_refresh_token(
    client: &Client,
    settings: &OAuthSettings,
    refresh_token: &str,
) -> Result<Credential, TwitchError> {
    let form = [
        ("grant_type", GrantKind::RefreshToken.as_str()),
        ("refresh_token", refresh_token),
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
    ];

    post_token_form(client, settings, GrantKind::RefreshToken, &form).await
}

/// Client-credentials app token
pub async fn request_app_token(
    client: &Client,
    settings: &OAuthSettings,
) -> Result<Credential, TwitchError> {
    let form = [
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
        ("grant_type", GrantKind::ClientCredentials.as_str()),
    ];

    let mut credential =
        post_token_form(client, settings, GrantKind::ClientCredentials, &form).await?;
    // Twitch never issues a refresh token for app tokens; do not trust one anyway
    credential.refresh_token.clear();
    Ok(credential)
}

async fn post_token_form(
    client: &Client,
    settings: &OAuthSettings,
    grant: GrantKind,
    form: &[(&str, &str)],
) -> Result<Credential, TwitchError> {
    let url = settings.token_url();
    tracing::debug!(grant = grant.as_str(), url = %url, "Requesting Twitch token");

    let response = client
        .post(&url)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .form(form)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(grant = grant.as_str(), "Token request failed: {}", e);
            TwitchError::exchange_transport(&e)
        })?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            "Twitch {} exchange failed: status={}, body={}",
            grant.as_str(),
            status,
            error_text
        );
        return Err(TwitchError::ExchangeFailed {
            status: status.as_u16(),
            message: extract_provider_message(&error_text),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| TwitchError::exchange_transport(&e))?;
    let data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
        TwitchError::MalformedResponse(format!("{} token response: {}", grant.as_str(), e))
    })?;

    if data.access_token.is_empty() {
        return Err(TwitchError::MalformedResponse(
            "token response does not contain access_token".to_string(),
        ));
    }
    if grant != GrantKind::ClientCredentials
        && data.refresh_token.as_deref().unwrap_or("").is_empty()
    {
        return Err(TwitchError::MalformedResponse(format!(
            "{} response does not contain refresh_token",
            grant.as_str()
        )));
    }

    let expires_in = data.expires_in;
    let credential = Credential::from_response(data, Utc::now()).ok_or_else(|| {
        TwitchError::MalformedResponse(format!(
            "{} response has out-of-range expires_in: {}",
            grant.as_str(),
            expires_in
        ))
    })?;
    tracing::info!(
        "Twitch token acquired via {}, expires: {}",
        grant.as_str(),
        credential.expires_at.to_rfc3339()
    );

    Ok(credential)
}

/// Twitch error bodies look like `{"status":400,"message":"Invalid authorization code"}`
fn extract_provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mockito::Matcher;

    fn settings(base: &str) -> OAuthSettings {
        OAuthSettings {
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost/cb".to_string(),
            scopes: "user:read:email".to_string(),
            id_base_url: base.to_string(),
            helix_base_url: format!("{}/helix", base),
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let mut s = settings("https://id.twitch.tv/");
        s.helix_base_url = "https://api.twitch.tv/helix/".to_string();
        assert_eq!(s.token_url(), "https://id.twitch.tv/oauth2/token");
        assert_eq!(s.authorize_url(), "https://id.twitch.tv/oauth2/authorize");
        assert_eq!(s.helix_url("/users"), "https://api.twitch.tv/helix/users");
        assert_eq!(s.helix_url("games/top"), "https://api.twitch.tv/helix/games/top");
    }

    #[test]
    fn test_extract_provider_message() {
        assert_eq!(
            extract_provider_message(r#"{"status":400,"message":"Invalid authorization code"}"#),
            "Invalid authorization code"
        );
        assert_eq!(extract_provider_message("bad gateway"), "bad gateway");
    }

    #[tokio::test]
    async fn test_authorization_code_sends_form_and_parses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "http://localhost/cb".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"A","refresh_token":"R","expires_in":3600,"token_type":"bearer"}"#,
            )
            .create_async()
            .await;

        let client = Client::new();
        let cred = exchange_authorization_code(
            &client,
            &settings(&server.url()),
            "the-code",
            "http://localhost/cb",
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(cred.access_token, "A");
        assert_eq!(cred.refresh_token, "R");
        assert_eq!(cred.token_type, "bearer");
        let drift = (cred.expires_at - (Utc::now() + Duration::seconds(3600)))
            .num_milliseconds()
            .abs();
        assert!(drift < 1000);
    }

    #[tokio::test]
    async fn test_non_success_status_is_exchange_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(400)
            .with_body(r#"{"status":400,"message":"Invalid authorization code"}"#)
            .create_async()
            .await;

        let err = exchange_authorization_code(
            &Client::new(),
            &settings(&server.url()),
            "bad",
            "http://localhost/cb",
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            TwitchError::ExchangeFailed {
                status: 400,
                message: "Invalid authorization code".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_fields_are_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A","token_type":"bearer"}"#)
            .create_async()
            .await;

        let err = request_app_token(&Client::new(), &settings(&server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_expires_in_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A","expires_in":9223372036854775807,"token_type":"bearer"}"#)
            .create_async()
            .await;

        let client = Client::new();
        let settings = settings(&server.url());
        let result = tokio::spawn(async move { request_app_token(&client, &settings).await })
            .await
            .unwrap();
        assert!(matches!(result, Err(TwitchError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_refresh_without_rotated_token_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A2","expires_in":10,"token_type":"bearer"}"#)
            .create_async()
            .await;

        let err = exchange_refresh_token(&Client::new(), &settings(&server.url()), "R")
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_app_token_never_carries_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "client_credentials".into(),
            ))
            .with_status(200)
            .with_body(
                r#"{"access_token":"app","refresh_token":"unexpected","expires_in":60,"token_type":"bearer"}"#,
            )
            .create_async()
            .await;

        let cred = request_app_token(&Client::new(), &settings(&server.url()))
            .await
            .unwrap();
        assert_eq!(cred.access_token, "app");
        assert!(cred.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_exchange_failed() {
        // Nothing listens on port 9 in the test environment
        let err = request_app_token(&Client::new(), &settings("http://127.0.0.1:9"))
            .await
            .unwrap_err();
        assert!(matches!(err, TwitchError::ExchangeFailed { status: 0, .. }));
    }
}
