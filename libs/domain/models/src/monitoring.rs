use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable capture of one fetched URL (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub url: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub html: String,
    pub extracted_text: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub load_time_ms: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Changed,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffType {
    Html,
    Text,
    Hash,
}

/// An immutable diff record between two consecutive snapshots (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageChange {
    pub id: Uuid,
    pub monitor_id: Uuid,
    pub previous_snapshot_id: Uuid,
    pub current_snapshot_id: Uuid,
    pub similarity_score: f64,
    pub diff_summary: String,
    pub status: ChangeStatus,
    pub diff_type: DiffType,
    pub detected_at: DateTime<Utc>,
}

impl PageChange {
    pub fn classify(similarity: f64, threshold: f64) -> ChangeStatus {
        if similarity < threshold {
            ChangeStatus::Changed
        } else {
            ChangeStatus::Unchanged
        }
    }
}
