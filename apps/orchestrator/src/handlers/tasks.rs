// [apps/orchestrator/src/handlers/tasks.rs]

//! Task admission, inspection, cancellation, retry, and result export
//! (§4.1, §6.1, §6.3).

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scancore_domain_engines::portscan::parse_ports;
use scancore_domain_models::queue::QueuedTask;
use scancore_domain_models::task::{
    PageMonitorConfig, PortScanConfig, SubdomainConfig, Task, TaskConfig, TaskStatus,
};
use scancore_domain_store::assets::{export_csv, export_json};

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: String,
    pub targets: Vec<String>,
    pub config: TaskConfig,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    3600
}

/// Admits a task: validates, persists it `pending` in the durable store,
/// then enqueues it in the in-memory [`TaskQueue`](scancore_domain_store::TaskQueue)
/// for the dispatcher to promote.
pub async fn create_task(
    State(state): State<AppState>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<ApiEnvelope<Task>, AppError> {
    let mut task = Task::new(body.project_id, body.targets, body.config)?;
    task.priority = body.priority;
    task.timeout_secs = body.timeout_secs;
    admit(&state, task).await
}

#[derive(Debug, Deserialize)]
pub struct CreateSubdomainTaskRequest {
    pub project_id: String,
    pub config: SubdomainConfig,
    #[serde(default)]
    pub priority: i32,
}

pub async fn create_subdomain_task(
    State(state): State<AppState>,
    Json(body): Json<CreateSubdomainTaskRequest>,
) -> Result<ApiEnvelope<Task>, AppError> {
    let targets = vec![body.config.target.clone()];
    let mut task = Task::new(body.project_id, targets, TaskConfig::SubdomainEnum(body.config))?;
    task.priority = body.priority;
    admit(&state, task).await
}

#[derive(Debug, Deserialize)]
pub struct CreatePortScanTaskRequest {
    pub project_id: String,
    pub config: PortScanConfig,
    #[serde(default)]
    pub priority: i32,
}

pub async fn create_portscan_task(
    State(state): State<AppState>,
    Json(body): Json<CreatePortScanTaskRequest>,
) -> Result<ApiEnvelope<Task>, AppError> {
    parse_ports(&body.config.ports)?;
    let targets = body.config.targets.clone();
    let mut task = Task::new(body.project_id, targets, TaskConfig::PortScan(body.config))?;
    task.priority = body.priority;
    admit(&state, task).await
}

#[derive(Debug, Deserialize)]
pub struct CreateMonitorTaskRequest {
    pub project_id: String,
    pub config: PageMonitorConfig,
    #[serde(default)]
    pub priority: i32,
}

/// Admits the first check immediately, then hands the task's id to
/// [`scancore_domain_engines::MonitorScheduler`] so it keeps getting
/// rechecked on `interval_hours`, backing off on consecutive failures,
/// until the task is cancelled (§4.1 row F, §4.4).
pub async fn create_monitor_task(
    State(state): State<AppState>,
    Json(body): Json<CreateMonitorTaskRequest>,
) -> Result<ApiEnvelope<Task>, AppError> {
    let targets = vec![body.config.url.clone()];
    let interval_hours = body.config.interval_hours;
    let mut task = Task::new(body.project_id, targets, TaskConfig::PageMonitor(body.config))?;
    task.priority = body.priority;
    let task_id = task.id;
    let envelope = admit(&state, task).await?;

    let next_due = Utc::now() + chrono::Duration::hours(i64::from(interval_hours.max(1)));
    state.monitor_scheduler.schedule(task_id, interval_hours, next_due);

    Ok(envelope)
}

async fn admit(state: &AppState, task: Task) -> Result<ApiEnvelope<Task>, AppError> {
    state.tasks_db.insert(&task).await?;
    state.task_queue.push(QueuedTask {
        task_id: task.id,
        kind: task.kind,
        priority: task.priority,
        created_at: task.created_at,
    })?;
    Ok(ApiEnvelope::ok(task))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub project_id: String,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<ApiEnvelope<Vec<Task>>, AppError> {
    Ok(ApiEnvelope::ok(state.tasks_db.list_by_project(&query.project_id).await?))
}

pub async fn get_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiEnvelope<Task>, AppError> {
    let task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    Ok(ApiEnvelope::ok(task))
}

pub async fn cancel_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiEnvelope<Task>, AppError> {
    let mut task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    task.set_status(TaskStatus::Cancelled)?;
    state.tasks_db.update(&task).await?;
    Ok(ApiEnvelope::ok(task))
}

/// Re-admits a failed or timed-out task as a fresh attempt: resets progress
/// and retry bookkeeping, then re-enqueues it (§3.3 "restart attempt").
pub async fn retry_task(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiEnvelope<Task>, AppError> {
    let mut task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    if !task.status.is_terminal() {
        return Err(scancore_domain_models::task::TaskError::TaskRunning.into());
    }
    task.restart_attempt();
    task.status = TaskStatus::Pending;
    task.retry_count += 1;
    state.tasks_db.update(&task).await?;
    state.task_queue.requeue(QueuedTask {
        task_id: task.id,
        kind: task.kind,
        priority: task.priority,
        created_at: Utc::now(),
    })?;
    Ok(ApiEnvelope::ok(task))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct PagedResults {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub items: Vec<scancore_domain_models::asset::Asset>,
}

pub async fn task_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<ApiEnvelope<PagedResults>, AppError> {
    let task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    let all = results_for_task(&state, &task);
    let total = all.len();
    let start = (query.page.saturating_sub(1)) * query.limit;
    let items = all.into_iter().skip(start).take(query.limit).collect();
    Ok(ApiEnvelope::ok(PagedResults { page: query.page, limit: query.limit, total, items }))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: String,
}

pub async fn export_task_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<String, AppError> {
    let task = state.tasks_db.get(id).await?.ok_or(scancore_domain_models::task::TaskError::NotFound)?;
    let assets = results_for_task(&state, &task);
    match query.format.as_str() {
        "csv" => Ok(export_csv(&assets)?),
        "json" => Ok(export_json(&assets)?),
        other => Err(scancore_domain_models::error::CoreError::new(
            scancore_domain_models::error::ErrorKind::BadRequest,
            format!("unsupported export format: {other}"),
        )
        .into()),
    }
}

fn results_for_task(state: &AppState, task: &Task) -> Vec<scancore_domain_models::asset::Asset> {
    state
        .asset_store
        .list(&task.project_id, None)
        .into_iter()
        .filter(|a| a.header.task_name.as_deref() == Some(task.id.to_string().as_str()))
        .collect()
}
