// [libs/infra/db/src/repositories/monitoring/mod.rs]

//! Durable persistence for [`PageSnapshot`] and [`PageChange`] (§3.1, §4.1
//! "Page monitoring").

mod queries;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use scancore_domain_models::monitoring::{ChangeStatus, DiffType, PageChange, PageSnapshot};

use crate::errors::DbError;

/// Repository of authority for the `page_snapshots` and `page_changes` tables.
pub struct MonitoringRepository {
    connection: Connection,
}

impl MonitoringRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, snapshot))]
    pub async fn insert_snapshot(&self, snapshot: &PageSnapshot) -> Result<(), DbError> {
        let headers_json = serde_json::to_string(&snapshot.headers).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::INSERT_SNAPSHOT,
                params![
                    snapshot.id.to_string(),
                    snapshot.monitor_id.to_string(),
                    snapshot.url.clone(),
                    snapshot.status_code,
                    headers_json,
                    snapshot.html.clone(),
                    snapshot.extracted_text.clone(),
                    snapshot.content_hash.clone(),
                    snapshot.size_bytes as i64,
                    snapshot.load_time_ms as i64,
                    snapshot.fetched_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn latest_snapshot(&self, monitor_id: Uuid) -> Result<Option<PageSnapshot>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_LATEST_SNAPSHOT, params![monitor_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_snapshot_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, change))]
    pub async fn insert_change(&self, change: &PageChange) -> Result<(), DbError> {
        self.connection
            .execute(
                queries::INSERT_CHANGE,
                params![
                    change.id.to_string(),
                    change.monitor_id.to_string(),
                    change.previous_snapshot_id.to_string(),
                    change.current_snapshot_id.to_string(),
                    change.similarity_score,
                    change.diff_summary.clone(),
                    status_str(change.status),
                    diff_type_str(change.diff_type),
                    change.detected_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn changes_for_monitor(&self, monitor_id: Uuid) -> Result<Vec<PageChange>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_CHANGES_FOR_MONITOR, params![monitor_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_change_row(&row)?);
        }
        Ok(out)
    }
}

fn status_str(s: ChangeStatus) -> &'static str {
    match s {
        ChangeStatus::Changed => "changed",
        ChangeStatus::Unchanged => "unchanged",
    }
}

fn status_from_str(s: &str) -> Result<ChangeStatus, DbError> {
    Ok(match s {
        "changed" => ChangeStatus::Changed,
        "unchanged" => ChangeStatus::Unchanged,
        other => return Err(DbError::MappingError(format!("unknown change status {other}"))),
    })
}

fn diff_type_str(d: DiffType) -> &'static str {
    match d {
        DiffType::Html => "html",
        DiffType::Text => "text",
        DiffType::Hash => "hash",
    }
}

fn diff_type_from_str(s: &str) -> Result<DiffType, DbError> {
    Ok(match s {
        "html" => DiffType::Html,
        "text" => DiffType::Text,
        "hash" => DiffType::Hash,
        other => return Err(DbError::MappingError(format!("unknown diff type {other}"))),
    })
}

fn map_snapshot_row(row: &Row) -> Result<PageSnapshot, DbError> {
    let id: String = row.get(0)?;
    let monitor_id: String = row.get(1)?;
    let headers_json: String = row.get(4)?;
    let fetched_at: String = row.get(10)?;
    Ok(PageSnapshot {
        id: id.parse().map_err(|_| DbError::MappingError("bad snapshot id".into()))?,
        monitor_id: monitor_id.parse().map_err(|_| DbError::MappingError("bad monitor id".into()))?,
        url: row.get(2)?,
        status_code: row.get::<i64>(3)? as u16,
        headers: serde_json::from_str::<HashMap<String, String>>(&headers_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        html: row.get(5)?,
        extracted_text: row.get(6)?,
        content_hash: row.get(7)?,
        size_bytes: row.get::<i64>(8)? as u64,
        load_time_ms: row.get::<i64>(9)? as u64,
        fetched_at: parse_dt(&fetched_at)?,
    })
}

fn map_change_row(row: &Row) -> Result<PageChange, DbError> {
    let id: String = row.get(0)?;
    let monitor_id: String = row.get(1)?;
    let previous: String = row.get(2)?;
    let current: String = row.get(3)?;
    let status: String = row.get(6)?;
    let diff_type: String = row.get(7)?;
    let detected_at: String = row.get(8)?;
    Ok(PageChange {
        id: id.parse().map_err(|_| DbError::MappingError("bad change id".into()))?,
        monitor_id: monitor_id.parse().map_err(|_| DbError::MappingError("bad monitor id".into()))?,
        previous_snapshot_id: previous.parse().map_err(|_| DbError::MappingError("bad snapshot id".into()))?,
        current_snapshot_id: current.parse().map_err(|_| DbError::MappingError("bad snapshot id".into()))?,
        similarity_score: row.get(4)?,
        diff_summary: row.get(5)?,
        status: status_from_str(&status)?,
        diff_type: diff_type_from_str(&diff_type)?,
        detected_at: parse_dt(&detected_at)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}
