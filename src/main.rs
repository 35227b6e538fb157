mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wxbot::{BotRegistry, HttpTransport, PassthroughCrypt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wxbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Listen: {}", config.server.listen);
    info!("  HTTP timeout: {}s", config.http.timeout_secs);
    info!("  Dedup capacity: {}", config.http.dedup_capacity);
    info!("  Bots: {}", config.bots.len());

    let transport =
        HttpTransport::new(config.http.timeout()).context("Failed to build HTTP client")?;
    let registry = BotRegistry::new(Arc::new(transport))
        .with_dedup_capacity(config.http.dedup_capacity);

    let mut app = Router::new();
    for bot_config in &config.bots {
        let bot = registry.get_or_create(&bot_config.name);
        bot.set_webhook_url(&bot_config.webhook_url)
            .with_context(|| format!("Bot '{}' has an invalid webhook_url", bot_config.name))?
            .set_debug(bot_config.debug);

        warn!(
            "Bot '{}' callbacks are not signature-checked or decrypted",
            bot_config.name
        );
        bot.serve(PassthroughCrypt);

        let routes = bot
            .router(&bot_config.path)
            .with_context(|| format!("Failed to build routes for bot '{}'", bot_config.name))?;
        app = app.merge(routes);
    }

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;

    info!("Serving bots {:?} on {}", registry.names(), config.server.listen);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
