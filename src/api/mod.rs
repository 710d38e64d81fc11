//! HTTP surface of the simulation engine.
//!
//! Endpoints:
//! - `GET /` and `GET /health` for service checks
//! - `POST /api/simulation` runs a batch over multipart-uploaded files
//! - `GET /api/simulation/progress` streams the next batch's milestones
//!
//! A client opens the progress stream first, then posts the files.

mod handlers;
mod types;

pub use types::ErrorResponse;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{EngineConfig, ServerConfig};
use crate::progress::ProgressHub;

/// Application state shared across all request handlers.
///
/// The configuration is read-only; the progress hub hands each subscriber
/// to the next simulation request.
#[derive(Debug)]
pub struct AppState {
    /// Engine configuration used for every batch.
    pub config: Arc<EngineConfig>,
    /// Pending progress subscription.
    pub progress: ProgressHub,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: Arc::new(config),
            progress: ProgressHub::new(),
        }
    }
}

/// Builds the axum router with all API routes.
///
/// Carries the configured body limit, CORS origins and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;
    let body_limit = server.max_upload_mb.saturating_mul(1024 * 1024);
    let cors = cors_layer(server);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/simulation", post(handlers::run_simulation))
        .route("/api/simulation/progress", get(handlers::progress_stream))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Binds to the given address and serves the API until the server fails.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server stops
/// with an error.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{addr}");
    axum::serve(listener, app).await
}
