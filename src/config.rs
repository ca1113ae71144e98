use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use reqwest::Url;
use std::io::Write;
use std::path::PathBuf;

use crate::auth::OAuthSettings;

/// TwitchStatClips - streamer statistics and clip dashboard backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Twitch application client id
    #[arg(long, env = "TWITCH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Twitch application client secret
    #[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth redirect URI registered with Twitch
    #[arg(
        long,
        env = "TWITCH_REDIRECT_URI",
        default_value = "http://localhost:8000/auth/twitch/callback"
    )]
    pub redirect_uri: String,

    /// Space separated OAuth scopes requested at login
    #[arg(long, env = "TWITCH_SCOPES", default_value = "user:read:email")]
    pub scopes: String,

    /// Twitch identity provider base URL
    #[arg(long, env = "TWITCH_ID_URL", default_value = "https://id.twitch.tv")]
    pub id_url: String,

    /// Twitch Helix API base URL
    #[arg(long, env = "TWITCH_HELIX_URL", default_value = "https://api.twitch.tv/helix")]
    pub helix_url: String,

    /// Path to the dashboard SQLite database
    #[arg(short = 'd', long, env = "DATABASE_FILE", default_value = "twitchstat.sqlite3")]
    pub db_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// HTTP max retries
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "2")]
    pub http_retries: u32,

    /// Seconds between background token refresh passes
    #[arg(long, env = "TOKEN_SWEEP_INTERVAL", default_value = "120")]
    pub sweep_interval: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Twitch application
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    pub twitch_redirect_uri: String,
    pub twitch_scopes: String,
    pub twitch_id_url: String,
    pub twitch_helix_url: String,

    // Storage
    pub database_file: PathBuf,

    // HTTP client
    pub http_request_timeout: u64,
    pub http_max_retries: u32,

    // Background work and caches (seconds)
    pub token_sweep_interval: u64,
    pub clip_cache_ttl: u64,
    pub stats_cache_ttl: u64,

    // Clip downloads
    pub download_command: String,
    pub download_script: PathBuf,
    pub download_dir: PathBuf,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            server_host: args.host,
            server_port: args.port,

            twitch_client_id: args
                .client_id
                .context("TWITCH_CLIENT_ID is required (use --client-id or set TWITCH_CLIENT_ID env var)")?,
            twitch_client_secret: args
                .client_secret
                .context("TWITCH_CLIENT_SECRET is required (use --client-secret or set TWITCH_CLIENT_SECRET env var)")?,
            twitch_redirect_uri: args.redirect_uri,
            twitch_scopes: args.scopes,
            twitch_id_url: args.id_url,
            twitch_helix_url: args.helix_url,

            database_file: expand_tilde(&args.db_file),

            http_request_timeout: args.http_timeout,
            http_max_retries: args.http_retries,

            token_sweep_interval: args.sweep_interval,
            clip_cache_ttl: env_or("CLIP_CACHE_TTL", 300),
            stats_cache_ttl: env_or("STATS_CACHE_TTL", 120),

            download_command: std::env::var("DOWNLOAD_COMMAND")
                .unwrap_or_else(|_| "python".to_string()),
            download_script: expand_tilde(
                &std::env::var("DOWNLOAD_SCRIPT")
                    .unwrap_or_else(|_| "scripts/download_clip.py".to_string()),
            ),
            download_dir: expand_tilde(
                &std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "clips".to_string()),
            ),

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.twitch_client_id.trim().is_empty() {
            anyhow::bail!("TWITCH_CLIENT_ID cannot be empty");
        }
        if self.twitch_client_secret.trim().is_empty() {
            anyhow::bail!("TWITCH_CLIENT_SECRET cannot be empty");
        }
        Url::parse(&self.twitch_redirect_uri).with_context(|| {
            format!(
                "TWITCH_REDIRECT_URI is not a valid URL: {}",
                self.twitch_redirect_uri
            )
        })?;
        if self.token_sweep_interval == 0 {
            anyhow::bail!("TOKEN_SWEEP_INTERVAL must be at least 1 second");
        }

        Ok(())
    }

    pub fn oauth_settings(&self) -> OAuthSettings {
        OAuthSettings {
            client_id: self.twitch_client_id.clone(),
            client_secret: self.twitch_client_secret.clone(),
            redirect_uri: self.twitch_redirect_uri.clone(),
            scopes: self.twitch_scopes.clone(),
            id_base_url: self.twitch_id_url.clone(),
            helix_base_url: self.twitch_helix_url.clone(),
        }
    }
}

fn env_or(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and missing client credentials)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();

    let has_client_id = std::env::var("TWITCH_CLIENT_ID").is_ok();
    let has_client_secret = std::env::var("TWITCH_CLIENT_SECRET").is_ok();

    !env_file_exists && (!has_client_id || !has_client_secret)
}

/// Run interactive setup to collect the Twitch application credentials
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("╔═══════════════════════════════════════════════════════════╗");
    println!("║           🔧 TwitchStatClips - First Time Setup           ║");
    println!("╚═══════════════════════════════════════════════════════════╝");
    println!();
    println!("No configuration found. Register an application at");
    println!("https://dev.twitch.tv/console/apps and enter its credentials.");
    println!();

    let client_id: String = Input::new()
        .with_prompt("Twitch client id (TWITCH_CLIENT_ID)")
        .interact_text()
        .context("Failed to read TWITCH_CLIENT_ID")?;
    if client_id.trim().is_empty() {
        anyhow::bail!("TWITCH_CLIENT_ID cannot be empty");
    }

    let client_secret: String = Password::new()
        .with_prompt("Twitch client secret (TWITCH_CLIENT_SECRET)")
        .interact()
        .context("Failed to read TWITCH_CLIENT_SECRET")?;
    if client_secret.trim().is_empty() {
        anyhow::bail!("TWITCH_CLIENT_SECRET cannot be empty");
    }

    println!();
    let server_port: String = Input::new()
        .with_prompt("Server port")
        .default("8000".to_string())
        .interact_text()
        .context("Failed to read server port")?;

    let redirect_uri: String = Input::new()
        .with_prompt("OAuth redirect URI (TWITCH_REDIRECT_URI)")
        .default(format!(
            "http://localhost:{}/auth/twitch/callback",
            server_port
        ))
        .interact_text()
        .context("Failed to read TWITCH_REDIRECT_URI")?;

    let config = InteractiveConfig {
        client_id,
        client_secret,
        redirect_uri,
        server_port,
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!();
        println!("✅ Configuration saved to .env file");
    }

    println!();
    println!("✅ Setup complete! Starting server...");
    println!();

    Ok(config)
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub server_port: String,
}

fn env_file_content(config: &InteractiveConfig) -> String {
    format!(
        r#"# TwitchStatClips Configuration
# Generated by interactive setup

# Twitch application (required)
TWITCH_CLIENT_ID={}
TWITCH_CLIENT_SECRET={}
TWITCH_REDIRECT_URI={}

# Server settings
SERVER_HOST=0.0.0.0
SERVER_PORT={}

# Storage
DATABASE_FILE=twitchstat.sqlite3

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.client_id, config.client_secret, config.redirect_uri, config.server_port,
    )
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(env_file_content(config).as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}
