//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use super::AppState;
use super::types::{ApiError, HealthResponse, SimulationQuery, WelcomeResponse, rejected};
use crate::error::SimulationError;
use crate::pipeline::{SimulationOutput, Upload, run_batch};
use crate::progress::ProgressSignal;

/// Multipart field name carrying the uploaded files.
const FILES_FIELD: &str = "files";

/// `GET /` → 200 + welcome message
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "BESS simulation API",
    })
}

/// `GET /health` → 200 + `{"status":"healthy"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Runs one simulation batch over the uploaded files.
///
/// `POST /api/simulation` (multipart, one or more `files` parts)
/// → 200 + `{"data": [...]}`, 400/500 + `ErrorResponse`
///
/// Progress goes to the subscriber registered through
/// [`progress_stream`] before this request arrived, if any. Extractor
/// rejections are answered with the same `ErrorResponse` body.
pub async fn run_simulation(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SimulationQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SimulationOutput>, ApiError> {
    // Taken first so every early return still closes the stream.
    let reporter = state.progress.reporter();

    let Query(query) = query?;
    let multipart = multipart?;
    if query.resolution_minutes == Some(0) {
        return Err(SimulationError::Upload("resolution_minutes must be > 0".to_string()).into());
    }

    let uploads = read_uploads(multipart).await?;
    info!(files = uploads.len(), "simulation requested");

    let config = Arc::clone(&state.config);
    let resolution = query.resolution_minutes;
    let output = tokio::task::spawn_blocking(move || {
        run_batch(&config, &uploads, reporter, resolution)
    })
    .await
    .map_err(|e| SimulationError::Computation(format!("simulation task failed: {e}")))??;

    Ok(Json(output))
}

async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, SimulationError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejected(e.status(), format!("{file_name}: {}", e.body_text())))?;
        uploads.push(Upload::new(file_name, bytes.to_vec()));
    }
    Ok(uploads)
}

/// Streams progress of the next simulation as server-sent events.
///
/// `GET /api/simulation/progress` → `text/event-stream`, one
/// `data: {"progress":N,"message":"..."}` event per milestone. The stream
/// ends once the simulation finishes or a newer subscriber replaces this one.
pub async fn progress_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    info!("progress stream connected");
    let rx = state.progress.subscribe();

    let stream = UnboundedReceiverStream::new(rx)
        .take_while(|signal| !matches!(signal, ProgressSignal::Finished))
        .filter_map(|signal| match signal {
            ProgressSignal::Update(event) => Some(Event::default().json_data(event)),
            ProgressSignal::Finished => None,
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use crate::api::{AppState, router};
    use crate::config::EngineConfig;

    fn make_app() -> axum::Router {
        router(std::sync::Arc::new(AppState::new(EngineConfig::baseline())))
    }

    #[tokio::test]
    async fn root_returns_welcome() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = make_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["message"].as_str().is_some());
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = make_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn simulation_without_files_returns_400() {
        let boundary = "EMPTYBOUNDARY";
        let req = Request::builder()
            .method("POST")
            .uri("/api/simulation")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(format!("--{boundary}--\r\n")))
            .unwrap();
        let resp = make_app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status_code"], 400);
        assert!(json["detail"].as_str().is_some());
    }

    #[tokio::test]
    async fn simulation_requires_multipart() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/simulation")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = make_app().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
