use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Master,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Offline,
    Disabled,
    Maintenance,
}

/// Composite load sample a worker reports on heartbeat (§4.6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub task_count: u32,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub throughput_last_minute: f32,
}

/// Normalizes the four raw metrics into a single [0,1] load score, lower is
/// less loaded (§4.6: "normalized to [0,1]").
pub fn composite_load(m: &NodeMetrics, max_task_count: u32, max_throughput: f32) -> f64 {
    let task_component = if max_task_count == 0 {
        0.0
    } else {
        m.task_count as f64 / max_task_count as f64
    };
    let throughput_component = if max_throughput <= 0.0 {
        0.0
    } else {
        (m.throughput_last_minute / max_throughput).clamp(0.0, 1.0) as f64
    };
    let cpu = (m.cpu_percent as f64 / 100.0).clamp(0.0, 1.0);
    let mem = (m.mem_percent as f64 / 100.0).clamp(0.0, 1.0);
    ((task_component + cpu + mem + throughput_component) / 4.0).clamp(0.0, 1.0)
}

/// A worker process the Task Manager can dispatch to (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub name: String,
    pub role: NodeRole,
    pub status: NodeStatus,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub metrics: NodeMetrics,
    pub tags: BTreeSet<String>,
    pub maintenance_reason: Option<String>,
}

impl Node {
    /// A Node is `offline` if no heartbeat arrived within `heartbeat_timeout`
    /// of `now` (§3.3). Does not mutate `status` — callers decide when to
    /// apply the result.
    pub fn is_stale(&self, now: DateTime<Utc>, heartbeat_timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) >= heartbeat_timeout
    }

    pub fn is_eligible(&self, role: NodeRole, required_tags: &BTreeSet<String>) -> bool {
        self.status == NodeStatus::Online && self.role == role && required_tags.is_subset(&self.tags)
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node not found")]
    NotFound,
    #[error("no eligible online node")]
    NoneAvailable,
}

impl From<&NodeError> for ErrorKind {
    fn from(e: &NodeError) -> Self {
        match e {
            NodeError::NotFound => ErrorKind::NodeNotFound,
            NodeError::NoneAvailable => ErrorKind::NodeOffline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_score_stays_in_unit_range() {
        let m = NodeMetrics { task_count: 50, cpu_percent: 120.0, mem_percent: 90.0, throughput_last_minute: 999.0 };
        let score = composite_load(&m, 10, 100.0);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn stale_detection_respects_timeout_window() {
        let now = Utc::now();
        let node = Node {
            id: Uuid::new_v4(),
            name: "w1".into(),
            role: NodeRole::Worker,
            status: NodeStatus::Online,
            registered_at: now,
            last_heartbeat: now - chrono::Duration::seconds(30),
            metrics: NodeMetrics::default(),
            tags: BTreeSet::new(),
            maintenance_reason: None,
        };
        assert!(!node.is_stale(now, chrono::Duration::seconds(60)));
        assert!(node.is_stale(now, chrono::Duration::seconds(10)));
    }
}
