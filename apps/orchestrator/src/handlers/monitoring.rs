// [apps/orchestrator/src/handlers/monitoring.rs]

//! Durable snapshot hand-off for the Page Monitoring engine (§4.4): a
//! worker reads the previous snapshot's text here to diff against, then
//! reports the fetch it just made so the next check has something to
//! compare. The similarity/diff computation itself stays in the engine —
//! this is persistence only.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use scancore_domain_models::monitoring::{ChangeStatus, DiffType, PageChange, PageSnapshot};
use scancore_domain_store::notify::{dispatch, NotificationEvent, NotificationKind};

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

pub async fn latest_snapshot(
    State(state): State<AppState>,
    Path(monitor_id): Path<Uuid>,
) -> Result<ApiEnvelope<Option<PageSnapshot>>, AppError> {
    Ok(ApiEnvelope::ok(state.monitoring_db.latest_snapshot(monitor_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SubmitSnapshotRequest {
    pub url: String,
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub html: String,
    pub extracted_text: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub load_time_ms: u64,
    pub similarity_score: f64,
    pub diff_summary: Option<String>,
    pub changed: bool,
}

/// Persists the snapshot a worker just fetched and, if it differs from the
/// previous one, the change record linking the two (§3.1, §4.4).
pub async fn submit_snapshot(
    State(state): State<AppState>,
    Path(monitor_id): Path<Uuid>,
    Json(body): Json<SubmitSnapshotRequest>,
) -> Result<ApiEnvelope<PageSnapshot>, AppError> {
    let previous = state.monitoring_db.latest_snapshot(monitor_id).await?;

    let snapshot = PageSnapshot {
        id: Uuid::new_v4(),
        monitor_id,
        url: body.url,
        status_code: body.status_code,
        headers: body.headers,
        html: body.html,
        extracted_text: body.extracted_text,
        content_hash: body.content_hash,
        size_bytes: body.size_bytes,
        load_time_ms: body.load_time_ms,
        fetched_at: Utc::now(),
    };
    state.monitoring_db.insert_snapshot(&snapshot).await?;

    if let Some(previous) = previous {
        if body.changed {
            let change = PageChange {
                id: Uuid::new_v4(),
                monitor_id,
                previous_snapshot_id: previous.id,
                current_snapshot_id: snapshot.id,
                similarity_score: body.similarity_score,
                diff_summary: body.diff_summary.unwrap_or_default(),
                status: ChangeStatus::Changed,
                diff_type: DiffType::Text,
                detected_at: Utc::now(),
            };
            state.monitoring_db.insert_change(&change).await?;
            notify_page_changed(&state, monitor_id, &change).await;
        }
    }

    Ok(ApiEnvelope::ok(snapshot))
}

/// The monitor's project isn't carried by `PageChange` itself — `monitor_id`
/// doubles as the originating `PageMonitor` task's id, so the project comes
/// from that task row. Dispatched in a spawned task so a slow/retrying
/// channel never delays the worker's snapshot-submission response.
async fn notify_page_changed(state: &AppState, monitor_id: Uuid, change: &PageChange) {
    let project_id = match state.tasks_db.get(monitor_id).await {
        Ok(Some(task)) => task.project_id,
        _ => "unknown".to_string(),
    };
    let event = NotificationEvent {
        id: Uuid::new_v4(),
        kind: NotificationKind::PageChanged,
        project_id,
        message: format!("monitor {monitor_id} detected a page change (similarity {:.3})", change.similarity_score),
        occurred_at: Utc::now(),
    };
    let channel = state.notify_channel.clone();
    let retry_interval = state.notify_retry_interval;
    tokio::spawn(async move { dispatch(channel.as_ref(), event, retry_interval).await });
}
