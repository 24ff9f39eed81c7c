// [libs/domain/store/src/nodes.rs]

//! In-memory authority over worker nodes (§4.6), grounded on
//! `swarm_telemetry.rs`'s `RwLock<HashMap<String, WorkerHeartbeat>>` shape.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use scancore_domain_models::node::{composite_load, Node, NodeError, NodeMetrics, NodeRole, NodeStatus};

/// `RwLock<HashMap<NodeId, Node>>` authority for worker liveness and load.
pub struct NodeRegistry {
    nodes: RwLock<HashMap<Uuid, Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { nodes: RwLock::new(HashMap::new()) }
    }

    /// Registers a new node or re-registers an existing one under the same id.
    #[instrument(skip(self))]
    pub fn register(&self, name: String, role: NodeRole, tags: BTreeSet<String>) -> Node {
        let now = Utc::now();
        let node = Node {
            id: Uuid::new_v4(),
            name,
            role,
            status: NodeStatus::Online,
            registered_at: now,
            last_heartbeat: now,
            metrics: NodeMetrics::default(),
            tags,
            maintenance_reason: None,
        };
        self.nodes.write().expect("node registry lock poisoned").insert(node.id, node.clone());
        info!(node_id = %node.id, "node registered");
        node
    }

    /// Records a heartbeat's metrics and flips the node back online if it
    /// had been marked stale.
    #[instrument(skip(self, metrics))]
    pub fn heartbeat(&self, node_id: Uuid, metrics: NodeMetrics) -> Result<(), NodeError> {
        let mut guard = self.nodes.write().expect("node registry lock poisoned");
        let node = guard.get_mut(&node_id).ok_or(NodeError::NotFound)?;
        node.last_heartbeat = Utc::now();
        node.metrics = metrics;
        if node.status == NodeStatus::Offline {
            node.status = NodeStatus::Online;
            info!(%node_id, "node recovered from stale heartbeat");
        }
        Ok(())
    }

    pub fn get(&self, node_id: Uuid) -> Option<Node> {
        self.nodes.read().expect("node registry lock poisoned").get(&node_id).cloned()
    }

    pub fn list(&self) -> Vec<Node> {
        self.nodes.read().expect("node registry lock poisoned").values().cloned().collect()
    }

    /// Picks the least-loaded eligible node for `role`/`required_tags`,
    /// normalizing the composite load score against the current fleet's
    /// observed maxima (§4.6).
    pub fn pick(&self, role: NodeRole, required_tags: &BTreeSet<String>) -> Option<Uuid> {
        let guard = self.nodes.read().expect("node registry lock poisoned");
        let max_task_count = guard.values().map(|n| n.metrics.task_count).max().unwrap_or(0);
        let max_throughput = guard.values().map(|n| n.metrics.throughput_last_minute).fold(0.0_f32, f32::max);

        guard
            .values()
            .filter(|n| n.is_eligible(role, required_tags))
            .min_by(|a, b| {
                let score_a = composite_load(&a.metrics, max_task_count, max_throughput);
                let score_b = composite_load(&b.metrics, max_task_count, max_throughput);
                score_a.partial_cmp(&score_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|n| n.id)
    }

    /// Flips nodes whose last heartbeat is older than `heartbeat_timeout`
    /// to `offline`, without evicting them, mirroring `services/reaper.rs`'s
    /// swarm-purge block. Returns the ids flipped this sweep.
    #[instrument(skip(self))]
    pub fn sweep_stale(&self, now: DateTime<Utc>, heartbeat_timeout: chrono::Duration) -> Vec<Uuid> {
        let mut guard = self.nodes.write().expect("node registry lock poisoned");
        let mut flipped = Vec::new();
        for node in guard.values_mut() {
            if node.status == NodeStatus::Online && node.is_stale(now, heartbeat_timeout) {
                node.status = NodeStatus::Offline;
                warn!(node_id = %node.id, "node marked offline after missed heartbeats");
                flipped.push(node.id);
            }
        }
        flipped
    }

    /// Evicts nodes that have been offline for longer than `max_age`, the
    /// opt-in `auto_cleanup_after` sweep (§3.4).
    pub fn evict_long_offline(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<Uuid> {
        let mut guard = self.nodes.write().expect("node registry lock poisoned");
        let stale_ids: Vec<Uuid> = guard
            .values()
            .filter(|n| n.status == NodeStatus::Offline && now.signed_duration_since(n.last_heartbeat) >= max_age)
            .map(|n| n.id)
            .collect();
        for id in &stale_ids {
            guard.remove(id);
        }
        stale_ids
    }

    pub fn set_maintenance(&self, node_id: Uuid, reason: Option<String>) -> Result<(), NodeError> {
        let mut guard = self.nodes.write().expect("node registry lock poisoned");
        let node = guard.get_mut(&node_id).ok_or(NodeError::NotFound)?;
        node.status = if reason.is_some() { NodeStatus::Maintenance } else { NodeStatus::Online };
        node.maintenance_reason = reason;
        Ok(())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_prefers_least_loaded_eligible_node() {
        let registry = NodeRegistry::new();
        let a = registry.register("a".into(), NodeRole::Worker, BTreeSet::new());
        let b = registry.register("b".into(), NodeRole::Worker, BTreeSet::new());

        registry.heartbeat(a.id, NodeMetrics { task_count: 10, cpu_percent: 90.0, mem_percent: 90.0, throughput_last_minute: 5.0 }).unwrap();
        registry.heartbeat(b.id, NodeMetrics { task_count: 1, cpu_percent: 5.0, mem_percent: 5.0, throughput_last_minute: 1.0 }).unwrap();

        assert_eq!(registry.pick(NodeRole::Worker, &BTreeSet::new()), Some(b.id));
    }

    #[test]
    fn stale_sweep_flips_status_without_evicting() {
        let registry = NodeRegistry::new();
        let node = registry.register("a".into(), NodeRole::Worker, BTreeSet::new());
        let future = Utc::now() + chrono::Duration::minutes(10);
        let flipped = registry.sweep_stale(future, chrono::Duration::seconds(30));
        assert_eq!(flipped, vec![node.id]);
        assert_eq!(registry.get(node.id).unwrap().status, NodeStatus::Offline);
    }
}
