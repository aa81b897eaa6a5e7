use std::sync::Arc;

use anyhow::Context;

use vitae_bot::channels::{CliChannel, ConnectorClient, bot_routes};
use vitae_bot::config::BotConfig;
use vitae_bot::delegate::{Delegate, WebhookDelegate};
use vitae_bot::dialogs::build_dialogs;
use vitae_bot::document::{AiDocumentExtractor, DocumentExtractor};
use vitae_bot::router::{DialogRouter, RouterConfig};
use vitae_bot::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    eprintln!("🤖 Vitae bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Messages: http://0.0.0.0:{}/api/messages", config.port);
    eprintln!(
        "   App id: {}",
        config.app.app_id.as_deref().unwrap_or("(not set)")
    );

    // ── State ────────────────────────────────────────────────────────────
    let state = store::open(config.state_db_path.as_deref())
        .await
        .context("Failed to open state store")?;
    match &config.state_db_path {
        Some(path) => eprintln!("   State: {}", path.display()),
        None => eprintln!("   State: in memory"),
    }

    // ── Delegates ────────────────────────────────────────────────────────
    let delegate: Arc<dyn Delegate> = Arc::new(WebhookDelegate::new(
        config.webhooks.clone(),
        config.delegate_timeout,
    ));
    for (name, url) in [
        ("solicitud", &config.webhooks.solicitud),
        ("candidato", &config.webhooks.candidato),
        ("validacion", &config.webhooks.validacion),
        ("vitae", &config.webhooks.vitae),
    ] {
        if url.is_none() {
            tracing::warn!(dialog = name, "No webhook configured; the dialog will apologize");
        }
    }

    let documents: Option<Arc<dyn DocumentExtractor>> =
        match AiDocumentExtractor::from_config(&config.document) {
            Ok(extractor) => {
                eprintln!("   PDF extraction: enabled");
                Some(Arc::new(extractor))
            }
            Err(e) => {
                eprintln!("   PDF extraction: disabled ({e})");
                None
            }
        };

    // ── Router ───────────────────────────────────────────────────────────
    let dialogs = build_dialogs(delegate, documents).context("Failed to build dialogs")?;
    let router = Arc::new(DialogRouter::new(
        state,
        dialogs,
        RouterConfig::from(&config),
    ));

    if config.cli_enabled {
        eprintln!("   CLI: enabled. Type a message and press Enter. /quit to exit.\n");
        let cli = CliChannel::new(Arc::clone(&router));
        tokio::spawn(async move {
            if let Err(e) = cli.run().await {
                tracing::error!(error = %e, "CLI channel stopped");
            }
        });
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = bot_routes(router, ConnectorClient::new(config.delegate_timeout));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Bot server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Bot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
