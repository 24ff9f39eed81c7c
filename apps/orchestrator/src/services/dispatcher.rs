// [apps/orchestrator/src/services/dispatcher.rs]

//! Promotes tasks the in-memory [`TaskQueue`](scancore_domain_store::TaskQueue)
//! has admitted from `pending` to `queued` in the durable store, respecting
//! each type's `max_in_flight` ceiling. Once a task is `queued`, a polling
//! worker claims it through `GET /worker/tasks/next`
//! ([`TaskRepository::claim_next`](scancore_infra_db::TaskRepository::claim_next)).

use std::time::Duration;

use tracing::{error, warn};

use scancore_domain_models::task::{TaskStatus, TaskType};

use crate::kernel::AppState;

const TICK: Duration = Duration::from_millis(500);
const TASK_TYPES: [TaskType; 4] =
    [TaskType::SubdomainEnum, TaskType::PortScan, TaskType::PageMonitor, TaskType::VulnScan];

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        for kind in TASK_TYPES {
            let Some(permit) = state.task_queue.try_acquire_slot(kind) else { continue };
            let Some(queued) = state.task_queue.pop(kind) else {
                drop(permit);
                continue;
            };

            let task = match state.tasks_db.get(queued.task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    warn!(task_id = %queued.task_id, "dispatcher dropped a task with no durable record");
                    drop(permit);
                    continue;
                }
                Err(e) => {
                    error!(task_id = %queued.task_id, error = %e, "failed to load task for promotion");
                    drop(permit);
                    continue;
                }
            };

            let mut task = task;
            if task.status != TaskStatus::Pending {
                drop(permit);
                continue;
            }
            if let Err(e) = task.set_status(TaskStatus::Queued) {
                error!(task_id = %task.id, error = %e, "illegal promotion to queued");
                drop(permit);
                continue;
            }
            if let Err(e) = state.tasks_db.update(&task).await {
                error!(task_id = %task.id, error = %e, "failed to persist queued promotion");
            }

            // The in-flight permit is released here rather than held across
            // the task's whole run — `max_in_flight` bounds how many tasks
            // this dispatcher promotes concurrently, not how many a worker
            // may run at once (that ceiling lives on the worker's own
            // concurrency-bounded engines).
            drop(permit);
        }
    }
}
