// [apps/orchestrator/src/services/heartbeat_sweeper.rs]

//! Flips nodes whose heartbeat has gone stale to `offline`, then evicts
//! nodes that have stayed offline past the cleanup window (§3.4, §4.6).

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use scancore_domain_store::notify::{dispatch, NotificationEvent, NotificationKind};

const TICK: Duration = Duration::from_secs(10);
const HEARTBEAT_TIMEOUT: chrono::Duration = chrono::Duration::seconds(60);
const EVICTION_AGE: chrono::Duration = chrono::Duration::hours(24);

pub async fn run(state: crate::kernel::AppState) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;
        let now = Utc::now();

        let flipped = state.node_registry.sweep_stale(now, HEARTBEAT_TIMEOUT);
        if !flipped.is_empty() {
            warn!(count = flipped.len(), "nodes marked offline after missed heartbeats");
            for node_id in flipped {
                if let Some(node) = state.node_registry.get(node_id) {
                    if let Err(e) = state.nodes_db.upsert(&node).await {
                        warn!(%node_id, error = %e, "failed to persist stale-offline status");
                    }
                }
                notify_node_offline(&state, node_id).await;
            }
        }

        let evicted = state.node_registry.evict_long_offline(now, EVICTION_AGE);
        if !evicted.is_empty() {
            info!(count = evicted.len(), "long-offline nodes evicted from the live registry");
        }
    }
}

/// Fleet health has no single owning project, so `NodeOffline` events carry
/// a fixed `"fleet"` project id rather than one threaded through from a task.
/// Dispatched off the sweep tick in a spawned task so a slow/retrying
/// channel never delays the next sweep.
async fn notify_node_offline(state: &crate::kernel::AppState, node_id: Uuid) {
    let event = NotificationEvent {
        id: Uuid::new_v4(),
        kind: NotificationKind::NodeOffline,
        project_id: "fleet".to_string(),
        message: format!("node {node_id} marked offline after missed heartbeats"),
        occurred_at: Utc::now(),
    };
    let channel = state.notify_channel.clone();
    let retry_interval = state.notify_retry_interval;
    tokio::spawn(async move { dispatch(channel.as_ref(), event, retry_interval).await });
}
