//! HTTP front end for the pipeline.
//!
//! A thin transport over a shared [`RagPipeline`]: each request is answered
//! independently and failures never leak internal detail to the caller.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version and index backend) |
//! | `POST` | `/answer` | `{"question": "..."}` → `{"answer": "..."}` |
//! | `POST` | `/sync` | Index new knowledge-base files, returns the sync report |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "answer_unavailable", "message": "Sorry, ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `answer_unavailable` (503, message is
//! the configured fallback), and the pipeline error kind for a failed
//! `/sync` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::index::SyncReport;
use crate::pipeline::{RagPipeline, Reply};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    /// Shown to the user instead of any failure detail.
    pub fallback_message: Arc<str>,
}

/// Build the router. Split out from [`run_server`] so tests can drive it
/// without a socket.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/answer", post(handle_answer))
        .route("/sync", post(handle_sync))
        .layer(cors)
        .with_state(state)
}

/// Serve `pipeline` on `config.server.bind` until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Arc<RagPipeline>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        pipeline,
        fallback_message: Arc::from(config.server.fallback_message.as_str()),
    };
    let app = router(state);

    info!(bind = %bind_addr, "starting server");
    println!("petcare server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn answer_unavailable(fallback: &str) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "answer_unavailable".to_string(),
        message: fallback.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    backend: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.pipeline.backend().to_string(),
    })
}

// ============ POST /answer ============

#[derive(Deserialize)]
struct AnswerRequest {
    question: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

async fn handle_answer(
    State(state): State<AppState>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, AppError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    match state.pipeline.respond(question).await {
        Reply::Answer(answer) => Ok(Json(AnswerResponse { answer })),
        Reply::Unavailable(_) => Err(answer_unavailable(&state.fallback_message)),
    }
}

// ============ POST /sync ============

async fn handle_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    state
        .pipeline
        .sync_knowledge_base()
        .await
        .map(Json)
        .map_err(|e| AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: e.kind().to_string(),
            message: e.to_string(),
        })
}
