// [apps/orchestrator/src/services/retry_sweeper.rs]

//! Enforces per-task timeouts and the retry/backoff policy (§3.3, §4.1):
//! a `running` task past its deadline times out; a `failed`/`timeout` task
//! under its retry ceiling is re-admitted after an exponential backoff.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use scancore_domain_models::queue::QueuedTask;
use scancore_domain_models::task::TaskStatus;
use scancore_domain_store::notify::{dispatch, NotificationEvent, NotificationKind};

use crate::kernel::AppState;

const TICK: Duration = Duration::from_secs(5);
const BASE_RETRY_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 3600;

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let now = Utc::now();

        let running = match state.tasks_db.list_running().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "failed to list running tasks for timeout sweep");
                continue;
            }
        };

        for mut task in running {
            let Some(started_at) = task.started_at else { continue };
            let deadline = started_at + chrono::Duration::seconds(task.timeout_secs as i64);
            if now < deadline {
                continue;
            }

            if let Err(e) = task.set_status(TaskStatus::Timeout) {
                error!(task_id = %task.id, error = %e, "illegal transition to timeout");
                continue;
            }
            warn!(task_id = %task.id, "task exceeded its timeout and was stopped");
            if let Err(e) = state.tasks_db.update(&task).await {
                error!(task_id = %task.id, error = %e, "failed to persist timeout");
                continue;
            }
            maybe_retry(&state, task).await;
        }
    }
}

/// Re-admits a terminally-failed task as a fresh attempt if it still has
/// retries left, backing off `BASE_RETRY_SECS * 2^attempt` capped at
/// `MAX_BACKOFF_SECS` before letting the dispatcher pick it up again.
async fn maybe_retry(state: &AppState, mut task: scancore_domain_models::task::Task) {
    if task.retry_count >= task.max_retries {
        notify_task_failed(state, &task);
        return;
    }
    let backoff = (BASE_RETRY_SECS * 2i64.saturating_pow(task.retry_count)).min(MAX_BACKOFF_SECS);
    task.restart_attempt();
    task.status = TaskStatus::Pending;
    task.retry_count += 1;
    if let Err(e) = state.tasks_db.update(&task).await {
        error!(task_id = %task.id, error = %e, "failed to persist retry re-admission");
        return;
    }
    info!(task_id = %task.id, attempt = task.retry_count, backoff_secs = backoff, "task scheduled to retry");

    let queue = state.task_queue.clone();
    let task_id = task.id;
    let kind = task.kind;
    let priority = task.priority;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(backoff as u64)).await;
        if let Err(e) = queue.push(QueuedTask { task_id, kind, priority, created_at: Utc::now() }) {
            warn!(%task_id, error = %e, "retry dropped, queue at capacity");
        }
    });
}

/// Fires once a timed-out task has exhausted its retry budget — the point
/// this task stops silently reappearing and a human should hear about it.
fn notify_task_failed(state: &AppState, task: &scancore_domain_models::task::Task) {
    let event = NotificationEvent {
        id: Uuid::new_v4(),
        kind: NotificationKind::TaskFailed,
        project_id: task.project_id.clone(),
        message: format!("task {} exceeded its timeout and exhausted its retry budget", task.id),
        occurred_at: Utc::now(),
    };
    let channel = state.notify_channel.clone();
    let retry_interval = state.notify_retry_interval;
    tokio::spawn(async move { dispatch(channel.as_ref(), event, retry_interval).await });
}
