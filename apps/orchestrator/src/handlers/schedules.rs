// [apps/orchestrator/src/handlers/schedules.rs]

//! Cron-recurring task admission (§4.1 "Scheduling"): a `ScheduleRule`
//! names a `task_template` the [`crate::services::scheduler`] daemon
//! copies into a fresh `Task` every time its `cron_expr` fires.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use cron::Schedule;
use serde::Deserialize;
use uuid::Uuid;

use scancore_domain_models::error::{CoreError, ErrorKind};
use scancore_domain_models::schedule::ScheduleRule;
use scancore_domain_models::task::TaskConfig;

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub project_id: String,
    pub name: String,
    pub cron_expr: String,
    pub targets: Vec<String>,
    pub task_template: TaskConfig,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    3600
}

/// Validates `cron_expr` and persists a new [`ScheduleRule`] with its first
/// `next_fire_at` already computed, so `services/scheduler.rs`'s poller
/// picks it up on its very next tick.
pub async fn create_schedule(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<ApiEnvelope<ScheduleRule>, AppError> {
    let schedule = Schedule::from_str(&body.cron_expr).map_err(|e| {
        AppError::from(CoreError::new(ErrorKind::BadRequest, format!("unparseable cron expression: {e}")))
    })?;
    let now = Utc::now();
    let next_fire_at = schedule.after(&now).next();

    let rule = ScheduleRule {
        id: Uuid::new_v4(),
        project_id: body.project_id,
        name: body.name,
        cron_expr: body.cron_expr,
        targets: body.targets,
        task_template: body.task_template,
        priority: body.priority,
        timeout_secs: body.timeout_secs,
        enabled: true,
        last_fired: None,
        next_fire_at,
        created_at: now,
    };
    state.schedules_db.insert(&rule).await?;
    Ok(ApiEnvelope::ok(rule))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiEnvelope<ScheduleRule>, AppError> {
    let rule = state
        .schedules_db
        .get(id)
        .await?
        .ok_or_else(|| AppError::from(CoreError::new(ErrorKind::NotFound, "schedule rule not found".to_string())))?;
    Ok(ApiEnvelope::ok(rule))
}

pub async fn delete_schedule(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiEnvelope<()>, AppError> {
    state.schedules_db.delete(id).await?;
    Ok(ApiEnvelope::ok(()))
}
