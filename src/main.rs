use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use slack_file_bot::config::BotConfig;
use slack_file_bot::pipeline::guards::{GuardChain, MimePrefixGuard};
use slack_file_bot::pipeline::{Dispatcher, FileEventHandler};
use slack_file_bot::processors;
use slack_file_bot::slack::{EventListener, SlackClient, events_router, spawn_listener};

/// Events waiting for the listener before new ones are dropped.
const EVENT_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()
        .context("Copy .env.example to .env and fill in your Slack credentials")?;

    eprintln!("⚡️ Slack file bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Events: http://0.0.0.0:{}/slack/events", config.port);
    eprintln!("   Max file size: {} bytes", config.max_file_size);

    let slack = Arc::new(SlackClient::new(config.bot_token.clone(), &config.api_base));

    // ── Bot identity ────────────────────────────────────────────────────
    let bot_user_id = match config.bot_user_id.clone() {
        Some(id) => id,
        None => slack
            .auth_test()
            .await
            .context("auth.test failed; check SLACK_BOT_TOKEN or set SLACK_BOT_USER_ID")?,
    };
    eprintln!("   Bot user: {}", bot_user_id);

    // ── Guards ──────────────────────────────────────────────────────────
    let mut guards = GuardChain::with_defaults(config.max_file_size);
    if !config.skip_mime_prefixes.is_empty() {
        eprintln!("   Skipping MIME: {}", config.skip_mime_prefixes.join(", "));
        guards.push(MimePrefixGuard::new(config.skip_mime_prefixes.clone()));
    }

    // ── Processors ──────────────────────────────────────────────────────
    let registry = Arc::new(processors::default_registry(&config.processors));
    eprintln!("   Processors: {} registered", registry.count());
    for line in registry.supported_types().lines() {
        eprintln!("     {}", line);
    }

    let handler = FileEventHandler::new(
        slack.clone(),
        slack.clone(),
        Arc::new(guards),
        Dispatcher::new(registry),
        Some(bot_user_id.clone()),
    );
    let listener = EventListener::new(handler, slack.clone(), Some(bot_user_id));

    // ── Event queue + HTTP server ───────────────────────────────────────
    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let listener_handle = spawn_listener(listener, events_rx);

    let app = events_router(config.signing_secret.clone(), events_tx);
    let tcp = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Events API server started");

    axum::serve(tcp, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Events API server failed")?;

    // The router (and its sender) is gone; let the listener finish queued events.
    listener_handle.await.ok();
    Ok(())
}
