//! HTTP surface.
//!
//! - `POST /ingest`: body is one CSV window, responds `{p_rush, status}`
//! - `GET /latest`: most recent result, `{p_rush, status, window_count}`
//! - `GET /health`: liveness plus the loaded model kind and width
//!
//! Ingestion is CPU-bound (parse, FFT, dot product), so it runs on the
//! blocking pool rather than an executor thread.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::pipeline::InferencePipeline;
use crate::types::{IngestResponse, StatusSnapshot};

type SharedPipeline = Arc<InferencePipeline>;

/// Error response: status code plus `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

/// Build the router over a shared pipeline.
pub fn router(pipeline: SharedPipeline, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/latest", get(latest))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn ingest(
    State(pipeline): State<SharedPipeline>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let body = body.inspect_err(|e| warn!(error = %e, "ingest body rejected"))?;
    let response = tokio::task::spawn_blocking(move || pipeline.ingest(&body))
        .await
        .map_err(|e| {
            error!(error = %e, "ingest task panicked or was cancelled");
            ApiError::internal("ingest task failed")
        })??;
    Ok(Json(response))
}

async fn latest(State(pipeline): State<SharedPipeline>) -> Json<StatusSnapshot> {
    Json(pipeline.status())
}

async fn health(State(pipeline): State<SharedPipeline>) -> Json<serde_json::Value> {
    let model = pipeline.engine().model();
    Json(serde_json::json!({
        "status": "ok",
        "model": model.kind(),
        "features": model.n_features(),
    }))
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(
    addr: SocketAddr,
    pipeline: SharedPipeline,
    max_body_bytes: usize,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(pipeline, max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
