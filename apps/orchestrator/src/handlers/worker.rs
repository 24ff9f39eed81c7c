// [apps/orchestrator/src/handlers/worker.rs]

//! The worker-facing side of the dispatch loop: a node polls for its next
//! assignment and reports progress/results back (§4.1, §4.6), matching
//! `scancore_infra_worker_client::WorkerClient`'s request shapes exactly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use scancore_domain_models::task::{Task, TaskResult, TaskStatus};

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

#[derive(Debug, Deserialize)]
pub struct NextTaskQuery {
    pub node_id: Uuid,
}

/// Claims the next dispatchable task for `node_id`, preferring one
/// reclaimed from a node whose heartbeat has gone stale (§4.1's two-phase
/// zombie-recovery-then-frontier-expansion dispatch).
pub async fn next_task(State(state): State<AppState>, Query(query): Query<NextTaskQuery>) -> Response {
    match state.tasks_db.claim_next(query.node_id).await {
        Ok(Some(task)) => ApiEnvelope::ok(task).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: f64,
}

pub async fn report_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ProgressRequest>,
) -> Result<ApiEnvelope<()>, AppError> {
    let mut task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    if task.status == TaskStatus::Queued {
        task.set_status(TaskStatus::Running)?;
    }
    task.update_progress(body.progress);
    state.tasks_db.update(&task).await?;
    Ok(ApiEnvelope::ok(()))
}

pub async fn submit_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(result): Json<TaskResult>,
) -> Result<ApiEnvelope<Task>, AppError> {
    let mut task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    task.summary.assets_found += result.finding_count;
    task.error = result.error.clone();
    task.set_status(if result.error.is_some() { TaskStatus::Failed } else { TaskStatus::Completed })?;
    task.update_progress(1.0);
    state.tasks_db.update(&task).await?;
    Ok(ApiEnvelope::ok(task))
}
