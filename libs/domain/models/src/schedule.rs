use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::task::TaskConfig;

/// A cron-like recurrence that produces fresh Tasks (§3.1, §4.1
/// "Scheduling"). The scheduler copies `task_template` into a new `Task`
/// each time `next_fire_at` elapses, then recomputes it from `cron_expr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub id: Uuid,
    pub project_id: String,
    pub name: String,
    pub cron_expr: String,
    pub targets: Vec<String>,
    pub task_template: TaskConfig,
    pub priority: i32,
    pub timeout_secs: u64,
    pub enabled: bool,
    pub last_fired: Option<DateTime<Utc>>,
    pub next_fire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
