//! Tamnone Gateway: relays dialogue to the hosted emotion Space.
//! One shared transcript, optional sled-backed history, JSON over HTTP.

mod app;
mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tamnone_core::{
    predict, DialogueSession, HistoryStore, PredictionBackend, PredictionOutcome, RelayConfig,
    SpaceClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{build_app, AppState};

const PROBE_TEXT: &str = "테스트: 안녕하세요.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[tamnone-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::load()?;

    let store = match config.history_path.as_deref() {
        Some(path) => HistoryStore::open(path)?,
        None => HistoryStore::ephemeral(),
    };
    if store.is_durable() {
        tracing::info!(
            "Dialogue history persisted at {}",
            config.history_path.as_deref().unwrap_or_default()
        );
    } else {
        tracing::info!("Dialogue history is in-memory only (no history_path configured)");
    }
    let session = Arc::new(DialogueSession::open(store)?);

    let backend = init_backend(&config).await?;
    if let (Some(backend), true) = (backend.as_deref(), config.probe_on_startup) {
        probe(backend, &config).await;
    }

    let state = AppState::new(&config, backend, Arc::clone(&session));
    let app = build_app(state, config.cors_permissive);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        "Tamnone gateway v{} listening on {}",
        tamnone_core::version(),
        listener.local_addr()?
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    session.flush()?;
    tracing::info!("Tamnone gateway stopped");
    Ok(())
}

/// Connect the Space client. A Space that cannot be reached leaves the gateway
/// up with analysis disabled.
async fn init_backend(
    config: &RelayConfig,
) -> Result<Option<Arc<dyn PredictionBackend>>, reqwest::Error> {
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let base_url = config.resolved_space_url();
    tracing::info!("API 클라이언트 연결을 초기화합니다... ({})", base_url);

    match SpaceClient::connect(http, &base_url, &config.api_name, config.hf_token.clone()).await {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(e) => {
            tracing::error!("클라이언트 초기화 실패: {}", e);
            Ok(None)
        }
    }
}

/// One test prediction at startup; the outcome is only logged.
async fn probe(backend: &dyn PredictionBackend, config: &RelayConfig) {
    let outcome = predict(
        backend,
        PROBE_TEXT,
        config.tuning_defaults(),
        config.request_timeout(),
    )
    .await;
    let latency = outcome.latency();
    match outcome {
        PredictionOutcome::Success { result, .. } if result.is_object() => {
            tracing::info!(latency, "API 클라이언트 연결 및 테스트 성공.");
        }
        PredictionOutcome::Success { result, .. } => {
            tracing::warn!(latency, "API 테스트 실패: {}", result);
        }
        PredictionOutcome::Failure { message, .. } => {
            tracing::warn!(latency, "API 테스트 실패: {}", message);
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
