// [libs/infra/db/src/repositories/schedule/mod.rs]

//! Durable persistence for [`ScheduleRule`] and the due-rule sweep the
//! scheduler polls (§4.1 "Scheduling").

mod queries;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use scancore_domain_models::schedule::ScheduleRule;
use scancore_domain_models::task::TaskConfig;

use crate::errors::DbError;

/// Repository of authority for the `schedule_rules` table.
pub struct ScheduleRepository {
    connection: Connection,
}

impl ScheduleRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, rule))]
    pub async fn insert(&self, rule: &ScheduleRule) -> Result<(), DbError> {
        let targets_json = serde_json::to_string(&rule.targets).map_err(|e| DbError::MappingError(e.to_string()))?;
        let template_json = serde_json::to_string(&rule.task_template).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::INSERT_RULE,
                params![
                    rule.id.to_string(),
                    rule.project_id.clone(),
                    rule.name.clone(),
                    rule.cron_expr.clone(),
                    targets_json,
                    template_json,
                    rule.priority,
                    rule.timeout_secs as i64,
                    rule.enabled as i64,
                    rule.last_fired.map(|t| t.to_rfc3339()),
                    rule.next_fire_at.map(|t| t.to_rfc3339()),
                    rule.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<ScheduleRule>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_ID, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Rules enabled and due to fire at or before `now`.
    #[instrument(skip(self))]
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduleRule>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_DUE, params![now.to_rfc3339()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn mark_fired(&self, id: Uuid, fired_at: DateTime<Utc>, next_fire_at: DateTime<Utc>) -> Result<(), DbError> {
        let affected = self
            .connection
            .execute(queries::MARK_FIRED, params![id.to_string(), fired_at.to_rfc3339(), next_fire_at.to_rfc3339()])
            .await?;
        if affected == 0 {
            return Err(DbError::ScheduleNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        self.connection.execute(queries::DELETE_RULE, params![id.to_string()]).await?;
        Ok(())
    }
}

fn map_row(row: &Row) -> Result<ScheduleRule, DbError> {
    let id: String = row.get(0)?;
    let targets_json: String = row.get(4)?;
    let template_json: String = row.get(5)?;
    let last_fired: Option<String> = row.get(9)?;
    let next_fire_at: Option<String> = row.get(10)?;
    let created_at: String = row.get(11)?;

    Ok(ScheduleRule {
        id: id.parse().map_err(|_| DbError::MappingError("bad rule id".into()))?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        cron_expr: row.get(3)?,
        targets: serde_json::from_str(&targets_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        task_template: serde_json::from_str::<TaskConfig>(&template_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        priority: row.get(6)?,
        timeout_secs: row.get::<i64>(7)? as u64,
        enabled: row.get::<i64>(8)? != 0,
        last_fired: last_fired.map(|s| parse_dt(&s)).transpose()?,
        next_fire_at: next_fire_at.map(|s| parse_dt(&s)).transpose()?,
        created_at: parse_dt(&created_at)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}
