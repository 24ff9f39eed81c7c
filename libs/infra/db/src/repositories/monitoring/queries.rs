// [libs/infra/db/src/repositories/monitoring/queries.rs]

//! SQL text for [`super::MonitoringRepository`].

pub const INSERT_SNAPSHOT: &str = r#"
    INSERT INTO page_snapshots (
        id, monitor_id, url, status_code, headers, html, extracted_text,
        content_hash, size_bytes, load_time_ms, fetched_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

pub const SELECT_LATEST_SNAPSHOT: &str = r#"
    SELECT id, monitor_id, url, status_code, headers, html, extracted_text,
           content_hash, size_bytes, load_time_ms, fetched_at
    FROM page_snapshots WHERE monitor_id = ?1 ORDER BY fetched_at DESC LIMIT 1
"#;

pub const INSERT_CHANGE: &str = r#"
    INSERT INTO page_changes (
        id, monitor_id, previous_snapshot_id, current_snapshot_id,
        similarity_score, diff_summary, status, diff_type, detected_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
"#;

pub const SELECT_CHANGES_FOR_MONITOR: &str = r#"
    SELECT id, monitor_id, previous_snapshot_id, current_snapshot_id,
           similarity_score, diff_summary, status, diff_type, detected_at
    FROM page_changes WHERE monitor_id = ?1 ORDER BY detected_at DESC
"#;
