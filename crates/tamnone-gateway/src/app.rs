//! Router and shared application state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tamnone_core::{DialogueSession, PredictionBackend, RelayConfig, TuningParameters};
use tower_http::cors::CorsLayer;

use crate::handlers;

/// Everything a handler may touch. The transcript is the only mutable state.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the Space client could not be initialized.
    pub backend: Option<Arc<dyn PredictionBackend>>,
    pub session: Arc<DialogueSession>,
    pub tuning_defaults: TuningParameters,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &RelayConfig,
        backend: Option<Arc<dyn PredictionBackend>>,
        session: Arc<DialogueSession>,
    ) -> Self {
        Self {
            backend,
            session,
            tuning_defaults: config.tuning_defaults(),
            request_timeout: config.request_timeout(),
        }
    }
}

pub fn build_app(state: AppState, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/", get(handlers::home))
        .route("/ping", get(handlers::ping))
        .route("/analyze", post(handlers::analyze))
        .route("/analyze_snapshot", post(handlers::analyze_snapshot))
        .route("/reset", post(handlers::reset))
        .route("/history", get(handlers::history))
        .with_state(state)
        .layer(axum::middleware::from_fn(log_request));

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

async fn log_request(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    tracing::info!(
        method = %request.method(),
        path = %request.uri().path(),
        %peer,
        "request"
    );
    next.run(request).await
}
