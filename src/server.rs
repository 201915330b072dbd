//! HTTP endpoint.
//!
//! # Endpoints
//!
//! | Method | Path       | Description |
//! |--------|------------|-------------|
//! | `POST` | `/analyze` | Translate a question to JQL and run it |
//! | `GET`  | `/health`  | Health check (returns version) |
//!
//! `POST /analyze` takes `{"text": "...", "context": {...}}`. A non-empty
//! `context` is applied before the question is answered. The analyzer's
//! envelope is returned verbatim with `200`, including the `error`
//! status. Failures outside the envelope (a bad context) produce `500`:
//!
//! ```json
//! { "detail": "Invalid context: new_docs must be a path string" }
//! ```
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::analyzer::{AnalyzeResponse, JqlAnalyzer};
use crate::config::Config;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<JqlAnalyzer>,
}

/// Build the router. Separate from [`run_server`] so it can be driven
/// without a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, analyzer: Arc<JqlAnalyzer>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState { analyzer });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");
    println!("JQL analyzer listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Any failure outside the analyzer envelope; always `500`.
struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: format!("{:#}", self.0),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /analyze ============

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

fn has_context(context: &serde_json::Value) -> bool {
    match context {
        serde_json::Value::Null => false,
        serde_json::Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    if has_context(&req.context) {
        state.analyzer.update_context(&req.context).await?;
    }
    Ok(Json(state.analyzer.respond(&req.text).await))
}
