// [apps/orchestrator/src/services/monitor_poller.rs]

//! Drives repeat checks for `PageMonitor` tasks off
//! [`MonitorScheduler`](scancore_domain_engines::MonitorScheduler)'s
//! backoff-aware due-time heap (§4.4). This is the finer-grained sibling
//! of [`crate::services::scheduler`]: a plain `ScheduleRule` only knows a
//! fixed cron cadence, not "try again sooner, then back off the more this
//! target keeps failing" — the behavior §4.4's scheduler requires.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, warn};

use scancore_domain_models::queue::QueuedTask;
use scancore_domain_models::task::{TaskConfig, TaskStatus};

use crate::kernel::AppState;

const TICK: Duration = Duration::from_secs(5);

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let now = Utc::now();

        loop {
            let Some(permit) = state.monitor_scheduler.try_acquire() else { break };
            let Some(due) = state.monitor_scheduler.pop_due(now) else { break };

            let state = state.clone();
            tokio::spawn(async move {
                let _permit = permit;
                recheck(&state, due).await;
            });
        }
    }
}

/// Re-admits the monitor's task for one more check, then reschedules it
/// with [`MonitorScheduler::reschedule`] based on how the last attempt
/// finished.
async fn recheck(state: &AppState, due: scancore_domain_engines::DueMonitor) {
    let task = match state.tasks_db.get(due.task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => return,
        Err(e) => {
            error!(task_id = %due.task_id, error = %e, "failed to load monitor task for recheck");
            state.monitor_scheduler.defer(due.task_id, due.consecutive_failures, TICK, Utc::now());
            return;
        }
    };
    let TaskConfig::PageMonitor(config) = task.config.clone() else { return };

    if !task.status.is_terminal() {
        // Still running from the last tick; try again shortly without
        // advancing (or resetting) the failure streak.
        state.monitor_scheduler.defer(due.task_id, due.consecutive_failures, TICK, Utc::now());
        return;
    }
    let failed = matches!(task.status, TaskStatus::Failed | TaskStatus::Timeout);

    let mut task = task;
    task.restart_attempt();
    task.status = TaskStatus::Pending;
    if let Err(e) = state.tasks_db.update(&task).await {
        error!(task_id = %due.task_id, error = %e, "failed to persist monitor recheck admission");
        return;
    }
    if let Err(e) = state.task_queue.push(QueuedTask {
        task_id: task.id,
        kind: task.kind,
        priority: task.priority,
        created_at: Utc::now(),
    }) {
        warn!(task_id = %due.task_id, error = %e, "monitor recheck dropped, queue at capacity");
    }

    state.monitor_scheduler.reschedule(due.task_id, config.interval_hours, Utc::now(), due.consecutive_failures, failed);
}
