// [libs/infra/db/src/repositories/schedule/queries.rs]

//! SQL text for [`super::ScheduleRepository`].

pub const INSERT_RULE: &str = r#"
    INSERT INTO schedule_rules (
        id, project_id, name, cron_expr, targets, task_template,
        priority, timeout_secs, enabled, last_fired, next_fire_at, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
"#;

pub const SELECT_BY_ID: &str = r#"
    SELECT id, project_id, name, cron_expr, targets, task_template,
           priority, timeout_secs, enabled, last_fired, next_fire_at, created_at
    FROM schedule_rules WHERE id = ?1
"#;

pub const SELECT_DUE: &str = r#"
    SELECT id, project_id, name, cron_expr, targets, task_template,
           priority, timeout_secs, enabled, last_fired, next_fire_at, created_at
    FROM schedule_rules WHERE enabled = 1 AND next_fire_at <= ?1
"#;

pub const MARK_FIRED: &str = r#"
    UPDATE schedule_rules SET last_fired = ?2, next_fire_at = ?3 WHERE id = ?1
"#;

pub const DELETE_RULE: &str = r#"DELETE FROM schedule_rules WHERE id = ?1"#;
