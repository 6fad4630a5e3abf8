mod clock;
mod config;
mod errors;
mod fallback;
mod models;
mod reliability;
mod routes;
mod service;
mod upstream;

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::clock::SystemClock;
use crate::config::{AppConfig, UpstreamKind};
use crate::reliability::ReliabilityLayer;
use crate::routes::api_routes::{health_handler, send_message_handler};
use crate::service::chat_service::ChatService;
use crate::upstream::{CompletionBackend, HttpCompletionBackend, OllamaBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_relay=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();

    // ── Upstream backend ──────────────────────────────────────────────────────
    let backend: Arc<dyn CompletionBackend> = match config.upstream_kind {
        UpstreamKind::Http => {
            Arc::new(HttpCompletionBackend::new(&config.completion_url, &config.model_id))
        }
        UpstreamKind::Ollama => {
            Arc::new(OllamaBackend::new(&config.ollama_base_url, &config.model_id)?)
        }
    };
    info!(
        "Using {:?} upstream at {} (model {})",
        config.upstream_kind,
        backend.endpoint(),
        backend.model_id()
    );

    // ── Reliability layer (one per process) ───────────────────────────────────
    let reliability = Arc::new(ReliabilityLayer::new(
        backend,
        Arc::new(SystemClock),
        config.reliability.clone(),
    ));

    // Expired idempotency entries are also evicted lazily on read
    let sweeper = reliability.clone();
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.sweep();
        }
    });

    let chat_service = ChatService::new(reliability);

    // ── Router ────────────────────────────────────────────────────────────────
    let app = Router::new()
        .route("/api/chat", post(send_message_handler))
        .route("/api/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(chat_service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
