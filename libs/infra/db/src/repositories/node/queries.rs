// [libs/infra/db/src/repositories/node/queries.rs]

//! SQL text for [`super::NodeRepository`].

pub const UPSERT_NODE: &str = r#"
    INSERT INTO nodes (
        id, name, role, status, registered_at, last_heartbeat,
        task_count, cpu_percent, mem_percent, throughput_last_minute,
        tags, maintenance_reason
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        last_heartbeat = excluded.last_heartbeat,
        task_count = excluded.task_count,
        cpu_percent = excluded.cpu_percent,
        mem_percent = excluded.mem_percent,
        throughput_last_minute = excluded.throughput_last_minute
"#;

pub const SELECT_BY_ID: &str = r#"
    SELECT id, name, role, status, registered_at, last_heartbeat,
           task_count, cpu_percent, mem_percent, throughput_last_minute,
           tags, maintenance_reason
    FROM nodes WHERE id = ?1
"#;

pub const SELECT_ALL: &str = r#"
    SELECT id, name, role, status, registered_at, last_heartbeat,
           task_count, cpu_percent, mem_percent, throughput_last_minute,
           tags, maintenance_reason
    FROM nodes ORDER BY name ASC
"#;

pub const MARK_OFFLINE_IF_STALE: &str = r#"
    UPDATE nodes SET status = 'offline'
    WHERE status = 'online' AND last_heartbeat < ?1
"#;

pub const DELETE_NODE: &str = r#"DELETE FROM nodes WHERE id = ?1"#;
