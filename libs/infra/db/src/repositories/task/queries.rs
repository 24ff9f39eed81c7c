// [libs/infra/db/src/repositories/task/queries.rs]

//! SQL text for [`super::TaskRepository`].

pub const INSERT_TASK: &str = r#"
    INSERT INTO tasks (
        id, kind, project_id, targets, config, priority, timeout_secs,
        status, progress, retry_count, max_retries, scheduled_at,
        created_at, started_at, finished_at, assigned_node, parent_task,
        summary, error
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
"#;

pub const SELECT_BY_ID: &str = r#"
    SELECT id, kind, project_id, targets, config, priority, timeout_secs,
           status, progress, retry_count, max_retries, scheduled_at,
           created_at, started_at, finished_at, assigned_node, parent_task,
           summary, error
    FROM tasks WHERE id = ?1
"#;

pub const SELECT_BY_PROJECT: &str = r#"
    SELECT id, kind, project_id, targets, config, priority, timeout_secs,
           status, progress, retry_count, max_retries, scheduled_at,
           created_at, started_at, finished_at, assigned_node, parent_task,
           summary, error
    FROM tasks WHERE project_id = ?1 ORDER BY created_at DESC
"#;

/// Finds a `running` task whose owning node's heartbeat has gone stale —
/// the zombie-recovery half of dispatch.
pub const FIND_ORPHANED_TASK: &str = r#"
    SELECT t.id FROM tasks t
    JOIN nodes n ON n.id = t.assigned_node
    WHERE t.status = 'running' AND n.last_heartbeat < ?1
    ORDER BY t.started_at ASC
    LIMIT 1
"#;

pub const REQUEUE_ORPHANED_TASK: &str = r#"
    UPDATE tasks SET status = 'queued', assigned_node = NULL
    WHERE id = ?1 AND status = 'running'
"#;

/// Finds the highest-priority, oldest `queued` task — the frontier-expansion
/// half of dispatch.
pub const FIND_NEXT_QUEUED_TASK: &str = r#"
    SELECT id FROM tasks
    WHERE status = 'queued'
    ORDER BY priority DESC, created_at ASC
    LIMIT 1
"#;

pub const CLAIM_TASK: &str = r#"
    UPDATE tasks
    SET status = 'running', assigned_node = ?2, started_at = ?3
    WHERE id = ?1 AND status = 'queued'
"#;

pub const UPDATE_TASK: &str = r#"
    UPDATE tasks SET
        status = ?2, progress = ?3, retry_count = ?4, scheduled_at = ?5,
        started_at = ?6, finished_at = ?7, assigned_node = ?8,
        summary = ?9, error = ?10
    WHERE id = ?1
"#;

pub const DELETE_TASK: &str = r#"DELETE FROM tasks WHERE id = ?1"#;

/// Every task still in flight, for the retry/timeout sweeper.
pub const SELECT_RUNNING: &str = r#"
    SELECT id, kind, project_id, targets, config, priority, timeout_secs,
           status, progress, retry_count, max_retries, scheduled_at,
           created_at, started_at, finished_at, assigned_node, parent_task,
           summary, error
    FROM tasks WHERE status = 'running'
"#;
