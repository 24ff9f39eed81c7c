// [apps/orchestrator/src/services/scheduler.rs]

//! Polls due [`ScheduleRule`]s and fires a fresh [`Task`] from each one's
//! template (§4.1 "Scheduling"). Runs on a sub-10-second tick so a rule
//! never drifts far past its `next_fire_at`.

use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tracing::{error, info, warn};

use scancore_domain_models::queue::QueuedTask;
use scancore_domain_models::task::Task;

use crate::kernel::AppState;

const TICK: Duration = Duration::from_secs(5);

pub async fn run(state: AppState) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let now = Utc::now();
        let due = match state.schedules_db.due(now).await {
            Ok(rules) => rules,
            Err(e) => {
                error!(error = %e, "failed to poll due schedule rules");
                continue;
            }
        };

        for rule in due {
            let task = match Task::new(rule.project_id.clone(), rule.targets.clone(), rule.task_template.clone()) {
                Ok(mut t) => {
                    t.priority = rule.priority;
                    t.timeout_secs = rule.timeout_secs;
                    t
                }
                Err(e) => {
                    error!(rule = %rule.id, error = %e, "schedule rule produced an invalid task");
                    continue;
                }
            };

            if let Err(e) = state.tasks_db.insert(&task).await {
                error!(rule = %rule.id, error = %e, "failed to persist scheduled task");
                continue;
            }
            if let Err(e) = state.task_queue.push(QueuedTask {
                task_id: task.id,
                kind: task.kind,
                priority: task.priority,
                created_at: task.created_at,
            }) {
                warn!(rule = %rule.id, error = %e, "scheduled task dropped, queue at capacity");
            }

            let next_fire_at = match Schedule::from_str(&rule.cron_expr) {
                Ok(schedule) => schedule.after(&now).next(),
                Err(e) => {
                    error!(rule = %rule.id, error = %e, "schedule rule has an unparseable cron expression");
                    None
                }
            };
            let Some(next_fire_at) = next_fire_at else { continue };

            if let Err(e) = state.schedules_db.mark_fired(rule.id, now, next_fire_at).await {
                error!(rule = %rule.id, error = %e, "failed to record schedule rule firing");
            } else {
                info!(rule = %rule.id, task = %task.id, %next_fire_at, "schedule rule fired");
            }
        }
    }
}
