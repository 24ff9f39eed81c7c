use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorKind;

/// Kind of task the Task Manager can admit (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SubdomainEnum,
    PortScan,
    PageMonitor,
    /// Named as a discriminant but has no engine in this core; admission of a
    /// task with this kind always rejects with `bad_request`.
    VulnScan,
}

/// State machine position of a [`Task`]. The four non-`Paused` terminal
/// variants, plus `Paused`'s own escape to `Cancelled`, are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
        )
    }
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: TaskStatus, to: TaskStatus },
    #[error("task queue at capacity")]
    QueueFull,
    #[error("task is already running")]
    TaskRunning,
    #[error("task already completed")]
    TaskCompleted,
    #[error("task not found")]
    NotFound,
    #[error("task config does not match task kind")]
    ConfigMismatch,
}

impl From<&TaskError> for ErrorKind {
    fn from(e: &TaskError) -> Self {
        match e {
            TaskError::IllegalTransition { .. } => ErrorKind::Conflict,
            TaskError::QueueFull => ErrorKind::QueueFull,
            TaskError::TaskRunning => ErrorKind::TaskRunning,
            TaskError::TaskCompleted => ErrorKind::TaskCompleted,
            TaskError::NotFound => ErrorKind::NotFound,
            TaskError::ConfigMismatch => ErrorKind::BadRequest,
        }
    }
}

/// The *only* place allowed to construct a new [`TaskStatus`] transition
/// (single compare-and-set path). Every caller — in-memory task board,
/// durable repository, dispatcher — routes status changes through this.
pub fn transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    use TaskStatus::*;
    let legal = matches!(
        (from, to),
        (Pending, Queued)
            | (Queued, Running)
            | (Running, Paused)
            | (Paused, Running)
            | (Paused, Cancelled)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Timeout)
    ) || (!from.is_terminal() && to == Cancelled);
    if legal {
        Ok(())
    } else {
        Err(TaskError::IllegalTransition { from, to })
    }
}

/// Type-specific configuration blob (§6.2), closed over the three schemas
/// this core runs. A [`Task`] whose `kind` doesn't match its `config` variant
/// is rejected at admission rather than accepted and silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskConfig {
    SubdomainEnum(SubdomainConfig),
    PortScan(PortScanConfig),
    PageMonitor(PageMonitorConfig),
}

impl TaskConfig {
    pub fn kind(&self) -> TaskType {
        match self {
            TaskConfig::SubdomainEnum(_) => TaskType::SubdomainEnum,
            TaskConfig::PortScan(_) => TaskType::PortScan,
            TaskConfig::PageMonitor(_) => TaskType::PageMonitor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainConfig {
    pub target: String,
    pub max_workers: u32,
    pub timeout_secs: u64,
    pub wordlist_path: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    pub enable_wildcard: bool,
    pub max_retries: u32,
    pub enum_methods: Vec<String>,
    pub rate_limit: u32,
    pub enable_recursive: bool,
    pub max_depth: u32,
    pub verify_subdomains: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanConfig {
    pub targets: Vec<String>,
    pub ports: String,
    pub scan_method: PortScanMethod,
    pub max_workers: u32,
    pub timeout_secs: u64,
    pub enable_banner: bool,
    pub enable_ssl: bool,
    pub enable_service: bool,
    pub rate_limit: u32,
    #[serde(default)]
    pub exclude_ports: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortScanMethod {
    TcpConnect,
    TcpSyn,
    Udp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMonitorConfig {
    pub url: String,
    pub interval_hours: u32,
    pub compare_method: String,
    pub similarity_threshold: f64,
    pub ignore_numbers: bool,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub authentication: Option<serde_json::Value>,
    pub timeout_secs: u64,
}

/// Per-target/finding counters attached to a Task (§3.1 "summary counters").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSummary {
    pub targets_processed: u64,
    pub assets_found: u64,
    pub assets_merged: u64,
    pub errors: u64,
}

/// One user-submitted job (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskType,
    pub project_id: String,
    pub targets: Vec<String>,
    pub config: TaskConfig,
    pub priority: i32,
    pub timeout_secs: u64,
    pub status: TaskStatus,
    pub progress: f64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub assigned_node: Option<Uuid>,
    pub parent_task: Option<Uuid>,
    pub summary: TaskSummary,
    pub error: Option<String>,
}

impl Task {
    pub fn new(project_id: impl Into<String>, targets: Vec<String>, config: TaskConfig) -> Result<Self, TaskError> {
        let kind = config.kind();
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            project_id: project_id.into(),
            targets,
            config,
            priority: 0,
            timeout_secs: 3600,
            status: TaskStatus::Pending,
            progress: 0.0,
            retry_count: 0,
            max_retries: 3,
            scheduled_at: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            assigned_node: None,
            parent_task: None,
            summary: TaskSummary::default(),
            error: None,
        })
    }

    /// Moves the task to `to`, delegating legality to [`transition`] and
    /// stamping the timestamp fields the new status implies.
    pub fn set_status(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        transition(self.status, to)?;
        if to == TaskStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.status = to;
        Ok(())
    }

    /// Progress is monotonically non-decreasing within an attempt (§3.3);
    /// it only resets through [`Task::restart_attempt`].
    pub fn update_progress(&mut self, fraction: f64) {
        if fraction > self.progress {
            self.progress = fraction.clamp(0.0, 1.0);
        }
    }

    /// Clears progress and attempt timestamps ahead of a retry or a resume
    /// that re-enters `running` from scratch.
    pub fn restart_attempt(&mut self) {
        self.progress = 0.0;
        self.started_at = None;
        self.finished_at = None;
    }
}

/// Terminal artifact of a finished Task (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub finding_count: u64,
    pub error: Option<String>,
    pub per_target: Vec<TargetSummary>,
    pub asset_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSummary {
    pub target: String,
    pub findings: u64,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_happy_path() {
        assert!(transition(TaskStatus::Pending, TaskStatus::Queued).is_ok());
        assert!(transition(TaskStatus::Queued, TaskStatus::Running).is_ok());
        assert!(transition(TaskStatus::Running, TaskStatus::Completed).is_ok());
    }

    #[test]
    fn pause_resume_cycle() {
        assert!(transition(TaskStatus::Running, TaskStatus::Paused).is_ok());
        assert!(transition(TaskStatus::Paused, TaskStatus::Running).is_ok());
        assert!(transition(TaskStatus::Paused, TaskStatus::Cancelled).is_ok());
    }

    #[test]
    fn cancellation_from_any_non_terminal_state() {
        for s in [TaskStatus::Pending, TaskStatus::Queued, TaskStatus::Running, TaskStatus::Paused] {
            assert!(transition(s, TaskStatus::Cancelled).is_ok());
        }
    }

    #[test]
    fn terminal_states_are_sinks() {
        for s in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Cancelled, TaskStatus::Timeout] {
            assert!(transition(s, TaskStatus::Running).is_err());
            assert!(transition(s, TaskStatus::Cancelled).is_err());
        }
    }

    #[test]
    fn progress_never_decreases() {
        let cfg = TaskConfig::PageMonitor(PageMonitorConfig {
            url: "https://example.com".into(),
            interval_hours: 1,
            compare_method: "hybrid".into(),
            similarity_threshold: 0.9,
            ignore_numbers: false,
            ignore_patterns: vec![],
            headers: HashMap::new(),
            authentication: None,
            timeout_secs: 30,
        });
        let mut t = Task::new("proj", vec!["https://example.com".into()], cfg).unwrap();
        t.update_progress(0.5);
        t.update_progress(0.2);
        assert_eq!(t.progress, 0.5);
        t.update_progress(0.9);
        assert_eq!(t.progress, 0.9);
    }
}
