// [libs/infra/db/src/schema.rs]

//! Idempotent schema migrations for the scan core's tables.
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS`; columns added by
//! later revisions use `ALTER TABLE ... ADD COLUMN`, whose "duplicate column
//! name" error on a re-run is swallowed rather than treated as a failure.

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

const BASE_TABLES: &[(&str, &str)] = &[
    ("tasks", r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            project_id TEXT NOT NULL,
            targets TEXT NOT NULL,
            config TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            timeout_secs INTEGER NOT NULL DEFAULT 3600,
            status TEXT NOT NULL DEFAULT 'pending',
            progress REAL NOT NULL DEFAULT 0.0,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            scheduled_at TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            finished_at TEXT,
            assigned_node TEXT,
            parent_task TEXT,
            summary TEXT,
            error TEXT
        );
    "#),
    ("assets", r#"
        CREATE TABLE IF NOT EXISTS assets (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            root_domain TEXT NOT NULL,
            kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            data TEXT NOT NULL,
            task_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_scan_time TEXT NOT NULL,
            UNIQUE(project_id, kind, natural_key)
        );
    "#),
    ("asset_relations", r#"
        CREATE TABLE IF NOT EXISTS asset_relations (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            src_asset_id TEXT NOT NULL,
            dst_asset_id TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#),
    ("nodes", r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'offline',
            registered_at TEXT NOT NULL,
            last_heartbeat TEXT NOT NULL,
            task_count INTEGER NOT NULL DEFAULT 0,
            cpu_percent REAL NOT NULL DEFAULT 0.0,
            mem_percent REAL NOT NULL DEFAULT 0.0,
            throughput_last_minute REAL NOT NULL DEFAULT 0.0,
            tags TEXT NOT NULL DEFAULT '[]',
            maintenance_reason TEXT
        );
    "#),
    ("schedule_rules", r#"
        CREATE TABLE IF NOT EXISTS schedule_rules (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            name TEXT NOT NULL,
            cron_expr TEXT NOT NULL,
            targets TEXT NOT NULL,
            task_template TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            timeout_secs INTEGER NOT NULL DEFAULT 3600,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_fired TEXT,
            next_fire_at TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("sessions", r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            roles TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_used TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
    "#),
    ("page_snapshots", r#"
        CREATE TABLE IF NOT EXISTS page_snapshots (
            id TEXT PRIMARY KEY,
            monitor_id TEXT NOT NULL,
            url TEXT NOT NULL,
            status_code INTEGER NOT NULL,
            headers TEXT NOT NULL DEFAULT '{}',
            html TEXT NOT NULL,
            extracted_text TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            load_time_ms INTEGER NOT NULL,
            fetched_at TEXT NOT NULL
        );
    "#),
    ("page_changes", r#"
        CREATE TABLE IF NOT EXISTS page_changes (
            id TEXT PRIMARY KEY,
            monitor_id TEXT NOT NULL,
            previous_snapshot_id TEXT NOT NULL,
            current_snapshot_id TEXT NOT NULL,
            similarity_score REAL NOT NULL,
            diff_summary TEXT NOT NULL,
            status TEXT NOT NULL,
            diff_type TEXT NOT NULL,
            detected_at TEXT NOT NULL
        );
    "#),
];

const SCHEMA_REVISIONS: &[(&str, &str)] = &[
    ("tasks_add_config_version", "ALTER TABLE tasks ADD COLUMN config_version INTEGER DEFAULT 1"),
    ("nodes_add_drain_flag", "ALTER TABLE nodes ADD COLUMN draining INTEGER NOT NULL DEFAULT 0"),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_tasks_project_status", "CREATE INDEX IF NOT EXISTS idx_tasks_project_status ON tasks(project_id, status);"),
    ("idx_tasks_scheduled_at", "CREATE INDEX IF NOT EXISTS idx_tasks_scheduled_at ON tasks(scheduled_at);"),
    ("idx_assets_project_root", "CREATE INDEX IF NOT EXISTS idx_assets_project_root ON assets(project_id, root_domain);"),
    ("idx_asset_relations_src", "CREATE INDEX IF NOT EXISTS idx_asset_relations_src ON asset_relations(src_asset_id);"),
    ("idx_asset_relations_dst", "CREATE INDEX IF NOT EXISTS idx_asset_relations_dst ON asset_relations(dst_asset_id);"),
    ("idx_nodes_status", "CREATE INDEX IF NOT EXISTS idx_nodes_status ON nodes(status, role);"),
    ("idx_schedule_next_fire", "CREATE INDEX IF NOT EXISTS idx_schedule_next_fire ON schedule_rules(next_fire_at) WHERE enabled = 1;"),
    ("idx_sessions_expires", "CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);"),
    ("idx_page_snapshots_monitor", "CREATE INDEX IF NOT EXISTS idx_page_snapshots_monitor ON page_snapshots(monitor_id, fetched_at);"),
    ("idx_page_changes_monitor", "CREATE INDEX IF NOT EXISTS idx_page_changes_monitor ON page_changes(monitor_id, detected_at);"),
];

/// Applies table creation, then column revisions, then indexes, in order.
///
/// # Errors
/// Returns an error if a base table fails to create — that indicates a
/// broken connection rather than a schema drift we can tolerate.
#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("applying database schema");
    create_base_tables(conn).await?;
    apply_revisions(conn).await?;
    create_indexes(conn).await?;
    info!("schema up to date");
    Ok(())
}

async fn create_base_tables(db: &Connection) -> Result<()> {
    for (name, sql) in BASE_TABLES {
        debug!(table = *name, "creating table");
        db.execute(sql, ()).await.with_context(|| format!("failed to create table {name}"))?;
    }
    Ok(())
}

async fn apply_revisions(db: &Connection) -> Result<()> {
    for (name, sql) in SCHEMA_REVISIONS {
        match db.execute(sql, ()).await {
            Ok(_) => debug!(revision = *name, "applied schema revision"),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!(revision = *name, "revision already applied");
                } else {
                    warn!(revision = *name, error = %message, "schema revision failed");
                }
            }
        }
    }
    Ok(())
}

async fn create_indexes(db: &Connection) -> Result<()> {
    for (name, sql) in INDEXES {
        debug!(index = *name, "creating index");
        db.execute(sql, ()).await.with_context(|| format!("failed to create index {name}"))?;
    }
    Ok(())
}
