// [libs/infra/db/src/repositories/node/mod.rs]

//! Durable persistence for [`Node`], including the bulk staleness sweep
//! the Task Manager's heartbeat monitor runs on a timer (§3.3, §4.6).

mod queries;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use scancore_domain_models::node::{Node, NodeMetrics, NodeRole, NodeStatus};

use crate::errors::DbError;

/// Repository of authority for the `nodes` table.
pub struct NodeRepository {
    connection: Connection,
}

impl NodeRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, node))]
    pub async fn upsert(&self, node: &Node) -> Result<(), DbError> {
        let tags_json = serde_json::to_string(&node.tags).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::UPSERT_NODE,
                params![
                    node.id.to_string(),
                    node.name.clone(),
                    role_str(node.role),
                    status_str(node.status),
                    node.registered_at.to_rfc3339(),
                    node.last_heartbeat.to_rfc3339(),
                    node.metrics.task_count,
                    node.metrics.cpu_percent,
                    node.metrics.mem_percent,
                    node.metrics.throughput_last_minute,
                    tags_json,
                    node.maintenance_reason.clone(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Node>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_ID, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Node>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_ALL, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Flips every `online` node whose heartbeat predates `stale_before` to
    /// `offline`. Returns the number of nodes affected.
    #[instrument(skip(self))]
    pub async fn mark_stale_offline(&self, stale_before: DateTime<Utc>) -> Result<usize, DbError> {
        let affected = self.connection.execute(queries::MARK_OFFLINE_IF_STALE, params![stale_before.to_rfc3339()]).await?;
        Ok(affected as usize)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        self.connection.execute(queries::DELETE_NODE, params![id.to_string()]).await?;
        Ok(())
    }
}

fn role_str(r: NodeRole) -> &'static str {
    match r {
        NodeRole::Master => "master",
        NodeRole::Worker => "worker",
    }
}

fn role_from_str(s: &str) -> Result<NodeRole, DbError> {
    Ok(match s {
        "master" => NodeRole::Master,
        "worker" => NodeRole::Worker,
        other => return Err(DbError::MappingError(format!("unknown node role {other}"))),
    })
}

fn status_str(s: NodeStatus) -> &'static str {
    match s {
        NodeStatus::Online => "online",
        NodeStatus::Offline => "offline",
        NodeStatus::Disabled => "disabled",
        NodeStatus::Maintenance => "maintenance",
    }
}

fn status_from_str(s: &str) -> Result<NodeStatus, DbError> {
    Ok(match s {
        "online" => NodeStatus::Online,
        "offline" => NodeStatus::Offline,
        "disabled" => NodeStatus::Disabled,
        "maintenance" => NodeStatus::Maintenance,
        other => return Err(DbError::MappingError(format!("unknown node status {other}"))),
    })
}

fn map_row(row: &Row) -> Result<Node, DbError> {
    let id: String = row.get(0)?;
    let role: String = row.get(2)?;
    let status: String = row.get(3)?;
    let registered_at: String = row.get(4)?;
    let last_heartbeat: String = row.get(5)?;
    let tags_json: String = row.get(10)?;

    Ok(Node {
        id: id.parse().map_err(|_| DbError::MappingError("bad node id".into()))?,
        name: row.get(1)?,
        role: role_from_str(&role)?,
        status: status_from_str(&status)?,
        registered_at: parse_dt(&registered_at)?,
        last_heartbeat: parse_dt(&last_heartbeat)?,
        metrics: NodeMetrics {
            task_count: row.get::<i64>(6)? as u32,
            cpu_percent: row.get::<f64>(7)? as f32,
            mem_percent: row.get::<f64>(8)? as f32,
            throughput_last_minute: row.get::<f64>(9)? as f32,
        },
        tags: serde_json::from_str(&tags_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        maintenance_reason: row.get(11)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}
