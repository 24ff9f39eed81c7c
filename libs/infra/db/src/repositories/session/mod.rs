// [libs/infra/db/src/repositories/session/mod.rs]

//! Durable persistence for [`Session`] (§3.1, §4.7): the refresh-on-access
//! pattern lives on the domain type itself, this repository only persists
//! whatever state it lands on.

mod queries;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use scancore_domain_models::session::Session;

use crate::errors::DbError;

/// Repository of authority for the `sessions` table.
pub struct SessionRepository {
    connection: Connection,
}

impl SessionRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    #[instrument(skip(self, session))]
    pub async fn upsert(&self, session: &Session) -> Result<(), DbError> {
        let roles_json = serde_json::to_string(&session.roles).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::UPSERT_SESSION,
                params![
                    session.token.clone(),
                    session.user_id.to_string(),
                    roles_json,
                    session.created_at.to_rfc3339(),
                    session.last_used.to_rfc3339(),
                    session.expires_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, token: &str) -> Result<Option<Session>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_TOKEN, params![token]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Sweeps every session that has expired as of `now`, returning the
    /// count deleted.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let affected = self.connection.execute(queries::DELETE_EXPIRED, params![now.to_rfc3339()]).await?;
        Ok(affected as usize)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, token: &str) -> Result<(), DbError> {
        self.connection.execute(queries::DELETE_SESSION, params![token]).await?;
        Ok(())
    }
}

fn map_row(row: &Row) -> Result<Session, DbError> {
    let user_id: String = row.get(1)?;
    let roles_json: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let last_used: String = row.get(4)?;
    let expires_at: String = row.get(5)?;

    Ok(Session {
        token: row.get(0)?,
        user_id: user_id.parse::<Uuid>().map_err(|_| DbError::MappingError("bad user id".into()))?,
        roles: serde_json::from_str(&roles_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        created_at: parse_dt(&created_at)?,
        last_used: parse_dt(&last_used)?,
        expires_at: parse_dt(&expires_at)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}
