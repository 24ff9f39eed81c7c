// [apps/orchestrator/src/handlers/nodes.rs]

//! Node lifecycle (§4.6, §6.1): registration and heartbeat reporting, kept
//! in the in-memory [`NodeRegistry`](scancore_domain_store::NodeRegistry)
//! for dispatch decisions and mirrored into the durable store.

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scancore_domain_models::node::{NodeMetrics, NodeRole};

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub name: String,
    pub role: NodeRole,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterNodeResponse {
    pub id: Uuid,
}

pub async fn register_node(
    State(state): State<AppState>,
    Json(body): Json<RegisterNodeRequest>,
) -> Result<ApiEnvelope<RegisterNodeResponse>, AppError> {
    let tags: BTreeSet<String> = body.tags.into_iter().collect();
    let node = state.node_registry.register(body.name, body.role, tags);
    state.nodes_db.upsert(&node).await?;
    Ok(ApiEnvelope::ok(RegisterNodeResponse { id: node.id }))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub metrics: NodeMetrics,
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<ApiEnvelope<()>, AppError> {
    state.node_registry.heartbeat(id, body.metrics)?;
    if let Some(node) = state.node_registry.get(id) {
        state.nodes_db.upsert(&node).await?;
    }
    Ok(ApiEnvelope::ok(()))
}
