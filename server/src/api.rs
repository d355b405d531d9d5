//! HTTP surface of the document pipeline.
//!
//! - `GET /health` – liveness plus the number of jobs ever submitted.
//! - `POST /process` – queue a document; returns the job id immediately.
//! - `GET /job/:id` – the job id echoed back with its current status, or
//!   `"status": null` for unknown and expired ids.
//! - `GET /job/:id/result` – the full job record, including the extraction
//!   result or the failure message. Unknown and expired ids answer `404`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docintel::{DispatchError, JobRecord, StatusView, SubmitReceipt, SubmitRequest};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/process", post(process_document))
        .route("/job/:id", get(job_status))
        .route("/job/:id/result", get(job_result))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    queued_total: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let queued_total = state
        .dispatch
        .ledger()
        .queued_total()
        .await
        .map_err(DispatchError::from)?;

    Ok(Json(HealthResponse {
        status: "healthy",
        service: "docintel",
        version: env!("CARGO_PKG_VERSION"),
        queued_total,
    }))
}

async fn process_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitReceipt>, AppError> {
    let document_id = request.document_id.clone();
    let receipt = state.dispatch.submit(request).await?;
    tracing::info!(
        job_id = %receipt.job_id,
        document_id = %document_id,
        "Accepted document"
    );
    Ok(Json(receipt))
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusView>, AppError> {
    Ok(Json(state.dispatch.status(&job_id).await?))
}

async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .dispatch
        .result(&job_id)
        .await?
        .map(Json)
        .ok_or(AppError::JobNotFound)
}

enum AppError {
    JobNotFound,
    Dispatch(DispatchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::JobNotFound => (StatusCode::NOT_FOUND, "Job not found".to_string()),
            Self::Dispatch(e @ DispatchError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            Self::Dispatch(e) => {
                tracing::error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<DispatchError> for AppError {
    fn from(inner: DispatchError) -> Self {
        Self::Dispatch(inner)
    }
}
