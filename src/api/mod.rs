// src/api/mod.rs

//! HTTP surface.
//!
//! A thin layer over [`SchedulerHandle`]: request decoding, status-code
//! mapping and nothing else. All scheduling decisions live in the engine.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{debug, error};

use crate::engine::SchedulerHandle;
use crate::errors::SchedulerError;
use crate::store::{SubmitTask, Task, TaskStatus};

pub fn build_router(handle: SchedulerHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", post(submit_task).get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .with_state(handle)
}

/* ---------------- response types ---------------- */

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    id: String,
    status: TaskStatus,
}

#[derive(Debug, Serialize)]
struct TaskSummary {
    id: String,
    status: TaskStatus,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/* ---------------- handlers ---------------- */

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn submit_task(
    State(handle): State<SchedulerHandle>,
    Json(payload): Json<SubmitTask>,
) -> Result<Json<SubmitResponse>, ApiError> {
    debug!(task = %payload.id, "POST /tasks");
    let task = handle.submit_task(payload).await?;
    Ok(Json(SubmitResponse {
        id: task.id,
        status: task.status,
    }))
}

async fn get_task(
    State(handle): State<SchedulerHandle>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    debug!(task = %id, "GET /tasks/:id");
    let task = handle.get_task(&id)?;
    Ok(Json(task))
}

async fn list_tasks(State(handle): State<SchedulerHandle>) -> Result<Json<Vec<TaskSummary>>, ApiError> {
    debug!("GET /tasks");
    let tasks = handle.list_tasks()?;
    let summaries = tasks
        .into_iter()
        .map(|t| TaskSummary {
            id: t.id,
            status: t.status,
        })
        .collect();
    Ok(Json(summaries))
}

/* ---------------- error mapping ---------------- */

/// Maps scheduler errors onto HTTP responses.
pub struct ApiError(SchedulerError);

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SchedulerError::Conflict(_) => StatusCode::CONFLICT,
            SchedulerError::MissingDependency { .. }
            | SchedulerError::Cycle(_)
            | SchedulerError::InvalidTask(_) => StatusCode::BAD_REQUEST,
            SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::Sqlite(_) | SchedulerError::Io(_) | SchedulerError::Other(_) => {
                error!(error = %self.0, "internal error serving request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
