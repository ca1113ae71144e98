use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use twitch_stat_clips::{auth::RefreshSweep, config, db::Database, middleware, routes};

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and missing required values)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;

        // Set environment variables from interactive config so Config::load() can use them
        std::env::set_var("TWITCH_CLIENT_ID", &interactive_config.client_id);
        std::env::set_var("TWITCH_CLIENT_SECRET", &interactive_config.client_secret);
        std::env::set_var("TWITCH_REDIRECT_URI", &interactive_config.redirect_uri);
        std::env::set_var("SERVER_PORT", &interactive_config.server_port);
    }

    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 TwitchStatClips starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    tracing::info!("Opening database {}...", config.database_file.display());
    let db = Database::open(&config.database_file)?;

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let sweep_interval = Duration::from_secs(config.token_sweep_interval);
    print_startup_banner(&config);

    let app_state = routes::AppState::new(config, db)?;
    tracing::info!("✅ Services initialized");

    // Try the app grant once so the first requests do not pay for it
    match app_state.auth_manager.ensure_app_token().await {
        Ok(token) => {
            tracing::info!("✅ Twitch app token acquired ({}...)", token.redacted());
        }
        Err(e) => {
            tracing::error!("❌ Twitch app token request failed: {}", e);
            tracing::warn!("Server will start; Helix calls will retry token acquisition");
        }
    }

    // Background refresh sweep, stopped through the watch channel on shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = RefreshSweep::new(app_state.auth_manager.clone(), sweep_interval)
        .spawn(shutdown_rx.clone());
    // Expired sessions and cache entries are evicted on the same schedule
    let purge = app_state.spawn_purge(sweep_interval, shutdown_rx);

    // Build the application with routes and middleware
    let app = build_app(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Start server with graceful shutdown
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep.await {
        tracing::warn!("Token refresh sweep ended abnormally: {}", e);
    }
    if let Err(e) = purge.await {
        tracing::warn!("Cache purge task ended abnormally: {}", e);
    }

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// Build the application with all routes and middleware
fn build_app(state: routes::AppState) -> axum::Router {
    use axum::Router;

    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::auth_routes(state.clone()))
        .merge(routes::api_routes(state.clone()))
        .merge(routes::session_routes(state))
        // Middleware stack: tracing → compression → CORS (sessions are per-route)
        .layer(middleware::cors_layer())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Print startup banner
fn print_startup_banner(config: &config::Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║                  📺 TwitchStatClips                       ║
║                                                           ║
║       Streamer statistics and clip browsing backend       ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:       {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:        http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Redirect URI:  {}", config.twitch_redirect_uri);
    println!("  Database:      {}", config.database_file.display());
    println!("  Downloads:     {}", config.download_dir.display());
    println!("  Token sweep:   every {}s", config.token_sweep_interval);
    println!("  Log Level:     {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
