// [libs/infra/db/src/repositories/task/mod.rs]

//! Durable persistence for [`Task`], plus the dispatch queries the Task
//! Manager's scheduler needs: zombie recovery before frontier expansion,
//! grounded on the same two-phase transaction shape the upstream job
//! assignment code uses.

mod queries;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use scancore_domain_models::task::{Task, TaskConfig, TaskStatus, TaskSummary, TaskType};

use crate::errors::DbError;

/// Node heartbeats older than this are treated as abandoned for the purpose
/// of reclaiming a task they were running.
const NODE_STALE_THRESHOLD_SECS: i64 = 120;

/// Repository of authority for the `tasks` table.
pub struct TaskRepository {
    connection: Connection,
}

impl TaskRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, task))]
    pub async fn insert(&self, task: &Task) -> Result<(), DbError> {
        let targets_json = serde_json::to_string(&task.targets).map_err(|e| DbError::MappingError(e.to_string()))?;
        let config_json = serde_json::to_string(&task.config).map_err(|e| DbError::MappingError(e.to_string()))?;
        let summary_json = serde_json::to_string(&task.summary).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::INSERT_TASK,
                params![
                    task.id.to_string(),
                    kind_str(task.kind),
                    task.project_id.clone(),
                    targets_json,
                    config_json,
                    task.priority,
                    task.timeout_secs as i64,
                    status_str(task.status),
                    task.progress,
                    task.retry_count,
                    task.max_retries,
                    task.scheduled_at.map(|t| t.to_rfc3339()),
                    task.created_at.to_rfc3339(),
                    task.started_at.map(|t| t.to_rfc3339()),
                    task.finished_at.map(|t| t.to_rfc3339()),
                    task.assigned_node.map(|n| n.to_string()),
                    task.parent_task.map(|n| n.to_string()),
                    summary_json,
                    task.error.clone(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Task>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_ID, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<Task>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_PROJECT, params![project_id]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self, task))]
    pub async fn update(&self, task: &Task) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(
                queries::UPDATE_TASK,
                params![
                    task.id.to_string(),
                    status_str(task.status),
                    task.progress,
                    task.retry_count,
                    task.scheduled_at.map(|t| t.to_rfc3339()),
                    task.started_at.map(|t| t.to_rfc3339()),
                    task.finished_at.map(|t| t.to_rfc3339()),
                    task.assigned_node.map(|n| n.to_string()),
                    serde_json::to_string(&task.summary).map_err(|e| DbError::MappingError(e.to_string()))?,
                    task.error.clone(),
                ],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    /// Every task currently `running`, for the retry/timeout sweeper.
    #[instrument(skip(self))]
    pub async fn list_running(&self) -> Result<Vec<Task>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_RUNNING, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        let affected = self.connection.execute(queries::DELETE_TASK, params![id.to_string()]).await?;
        if affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    /// Assigns a task to `node_id`, preferring a task abandoned by a node
    /// whose heartbeat has gone stale over admitting a fresh one from the
    /// queue. Returns `None` if nothing is dispatchable right now.
    #[instrument(skip(self))]
    pub async fn claim_next(&self, node_id: Uuid) -> Result<Option<Task>, DbError> {
        let stale_before = Utc::now() - chrono::Duration::seconds(NODE_STALE_THRESHOLD_SECS);
        let txn = self.connection.transaction().await.map_err(|_| DbError::TransactionError)?;

        let mut orphaned = txn.query(queries::FIND_ORPHANED_TASK, params![stale_before.to_rfc3339()]).await?;
        if let Some(row) = orphaned.next().await? {
            let id: String = row.get(0)?;
            txn.execute(queries::CLAIM_TASK, params![id.clone(), node_id.to_string(), Utc::now().to_rfc3339()])
                .await?;
            txn.commit().await.map_err(|_| DbError::TransactionError)?;
            warn!(task_id = %id, node = %node_id, "reclaimed orphaned task from stale node");
            return self.get(id.parse().map_err(|_| DbError::MappingError("bad task id".into()))?).await;
        }

        let mut queued = txn.query(queries::FIND_NEXT_QUEUED_TASK, ()).await?;
        let Some(row) = queued.next().await? else {
            txn.commit().await.map_err(|_| DbError::TransactionError)?;
            return Ok(None);
        };
        let id: String = row.get(0)?;
        txn.execute(queries::CLAIM_TASK, params![id.clone(), node_id.to_string(), Utc::now().to_rfc3339()])
            .await?;
        txn.commit().await.map_err(|_| DbError::TransactionError)?;
        info!(task_id = %id, node = %node_id, "dispatched queued task");
        self.get(id.parse().map_err(|_| DbError::MappingError("bad task id".into()))?).await
    }
}

fn status_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Pending => "pending",
        TaskStatus::Queued => "queued",
        TaskStatus::Running => "running",
        TaskStatus::Paused => "paused",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Cancelled => "cancelled",
        TaskStatus::Timeout => "timeout",
    }
}

fn status_from_str(s: &str) -> Result<TaskStatus, DbError> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "queued" => TaskStatus::Queued,
        "running" => TaskStatus::Running,
        "paused" => TaskStatus::Paused,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "cancelled" => TaskStatus::Cancelled,
        "timeout" => TaskStatus::Timeout,
        other => return Err(DbError::MappingError(format!("unknown task status {other}"))),
    })
}

fn kind_str(k: TaskType) -> &'static str {
    match k {
        TaskType::SubdomainEnum => "subdomain_enum",
        TaskType::PortScan => "port_scan",
        TaskType::PageMonitor => "page_monitor",
        TaskType::VulnScan => "vuln_scan",
    }
}

fn map_row(row: &Row) -> Result<Task, DbError> {
    let id: String = row.get(0)?;
    let targets_json: String = row.get(3)?;
    let config_json: String = row.get(4)?;
    let scheduled_at: Option<String> = row.get(11)?;
    let created_at: String = row.get(12)?;
    let started_at: Option<String> = row.get(13)?;
    let finished_at: Option<String> = row.get(14)?;
    let assigned_node: Option<String> = row.get(15)?;
    let parent_task: Option<String> = row.get(16)?;
    let summary_json: String = row.get(17)?;
    let status_text: String = row.get(7)?;

    let config: TaskConfig =
        serde_json::from_str(&config_json).map_err(|e| DbError::MappingError(e.to_string()))?;

    Ok(Task {
        id: id.parse().map_err(|_| DbError::MappingError("bad task id".into()))?,
        kind: config.kind(),
        project_id: row.get(2)?,
        targets: serde_json::from_str(&targets_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        config,
        priority: row.get(5)?,
        timeout_secs: row.get::<i64>(6)? as u64,
        status: status_from_str(&status_text)?,
        progress: row.get(8)?,
        retry_count: row.get::<i64>(9)? as u32,
        max_retries: row.get::<i64>(10)? as u32,
        scheduled_at: parse_opt_dt(scheduled_at)?,
        created_at: parse_dt(&created_at)?,
        started_at: parse_opt_dt(started_at)?,
        finished_at: parse_opt_dt(finished_at)?,
        assigned_node: assigned_node.map(|n| n.parse()).transpose().map_err(|_| DbError::MappingError("bad node id".into()))?,
        parent_task: parent_task.map(|n| n.parse()).transpose().map_err(|_| DbError::MappingError("bad parent id".into()))?,
        summary: serde_json::from_str::<TaskSummary>(&summary_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        error: row.get(18)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}

fn parse_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    s.map(|s| parse_dt(&s)).transpose()
}
