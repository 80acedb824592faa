//! HTTP router and handlers
//!
//! The surface stays thin: body extraction, pipeline invocation, and
//! error-to-status mapping. All design content lives in the pipeline.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::Error;
use crate::pipeline::Pipeline;

/// Shared application state
pub struct AppState {
    /// The assembled prompt pipeline
    pub pipeline: Pipeline,
}

/// Inbound body for `POST /generate`
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Raw user prompt
    pub prompt: String,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/generate", post(generate_handler))
        // Permissive CORS: the gateway is meant to sit behind a browser
        // frontend on another origin.
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /generate - run the prompt through the pipeline
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    match state.pipeline.generate(&request.prompt).await {
        Ok(answer) => (StatusCode::OK, Json(answer)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Map a pipeline error onto the outbound HTTP contract.
///
/// Fatal upstream errors propagate the original status code and body as
/// the error detail; everything else gets this gateway's own status with
/// the error display text.
fn error_response(e: &Error) -> Response {
    let status =
        StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let detail = match e {
        Error::UpstreamFatal { body, .. } => body.clone(),
        other => other.to_string(),
    };

    error!(status = status.as_u16(), error = %e, "Request failed");
    (status, Json(json!({ "detail": detail }))).into_response()
}
