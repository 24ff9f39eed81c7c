// [libs/infra/db/src/repositories/asset/mod.rs]

//! Durable persistence for [`Asset`] and [`AssetRelation`], implementing
//! the natural-key upsert-merge described in §4.5: a duplicate discovery
//! merges into the existing row rather than inserting a new one.

mod queries;

use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use scancore_domain_models::asset::{Asset, AssetHeader, AssetKind, AssetRelation, NaturalKey};

use crate::errors::DbError;

/// Repository of authority for the `assets` and `asset_relations` tables.
pub struct AssetRepository {
    connection: Connection,
}

impl AssetRepository {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Inserts `asset`, or merges it into the existing row sharing its
    /// natural key within the same project. Returns the asset's id after
    /// the write — the incoming id on insert, the pre-existing id on merge.
    #[instrument(skip(self, asset))]
    pub async fn upsert(&self, asset: Asset) -> Result<Uuid, DbError> {
        let key = asset.kind.natural_key(&asset.header);
        let key_text = natural_key_text(&key);
        let variant = asset.kind.variant_name();

        let mut rows = self
            .connection
            .query(queries::SELECT_BY_NATURAL_KEY, params![asset.header.project_id.clone(), variant, key_text.clone()])
            .await?;

        if let Some(row) = rows.next().await? {
            let mut existing = map_row(&row)?;
            let existing_id = existing.header.id;
            existing.merge(asset);
            self.write_update(&existing).await?;
            info!(asset_id = %existing_id, variant, "merged asset into existing natural key");
            return Ok(existing_id);
        }

        let tags_json = serde_json::to_string(&asset.header.tags).map_err(|e| DbError::MappingError(e.to_string()))?;
        let data_json = serde_json::to_string(&asset.kind).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::INSERT_ASSET,
                params![
                    asset.header.id.to_string(),
                    asset.header.project_id.clone(),
                    asset.header.root_domain.clone(),
                    variant,
                    key_text,
                    tags_json,
                    data_json,
                    asset.header.task_name.clone(),
                    asset.header.created_at.to_rfc3339(),
                    asset.header.updated_at.to_rfc3339(),
                    asset.header.last_scan_time.to_rfc3339(),
                ],
            )
            .await?;
        info!(asset_id = %asset.header.id, variant, "inserted new asset");
        Ok(asset.header.id)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Asset>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_ID, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_by_project(&self, project_id: &str) -> Result<Vec<Asset>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_BY_PROJECT, params![project_id]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), DbError> {
        self.connection.execute(queries::DELETE_ASSET, params![id.to_string()]).await?;
        Ok(())
    }

    #[instrument(skip(self, relation))]
    pub async fn link(&self, relation: &AssetRelation) -> Result<(), DbError> {
        self.connection
            .execute(
                queries::INSERT_RELATION,
                params![
                    relation.id.to_string(),
                    relation.project_id.clone(),
                    relation.src_asset_id.to_string(),
                    relation.dst_asset_id.to_string(),
                    relation.relation_type.clone(),
                    relation.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn relations_from(&self, src_asset_id: Uuid) -> Result<Vec<AssetRelation>, DbError> {
        let mut rows = self.connection.query(queries::SELECT_RELATIONS_FROM, params![src_asset_id.to_string()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_relation_row(&row)?);
        }
        Ok(out)
    }

    async fn write_update(&self, asset: &Asset) -> Result<(), DbError> {
        let tags_json = serde_json::to_string(&asset.header.tags).map_err(|e| DbError::MappingError(e.to_string()))?;
        let data_json = serde_json::to_string(&asset.kind).map_err(|e| DbError::MappingError(e.to_string()))?;
        self.connection
            .execute(
                queries::UPDATE_ASSET,
                params![
                    asset.header.id.to_string(),
                    tags_json,
                    data_json,
                    asset.header.task_name.clone(),
                    asset.header.updated_at.to_rfc3339(),
                    asset.header.last_scan_time.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }
}

/// Flattens a [`NaturalKey`] into the text used for the `natural_key`
/// column's uniqueness guard. `NaturalKey` carries no `Display`/`Serialize`
/// impl of its own, so the infra layer owns this mapping.
fn natural_key_text(key: &NaturalKey) -> String {
    match key {
        NaturalKey::Domain { domain, .. } => domain.clone(),
        NaturalKey::Subdomain { host, .. } => host.clone(),
        NaturalKey::Ip { ip, .. } => ip.clone(),
        NaturalKey::Port { ip, port, protocol, .. } => format!("{ip}:{port}/{protocol}"),
        NaturalKey::Url { url_hash, .. } => url_hash.clone(),
        NaturalKey::Http { host, port, .. } => format!("{host}:{port}"),
        NaturalKey::Other { id, .. } => id.to_string(),
    }
}

fn map_row(row: &Row) -> Result<Asset, DbError> {
    let id: String = row.get(0)?;
    let tags_json: String = row.get(5)?;
    let data_json: String = row.get(6)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;
    let last_scan_time: String = row.get(10)?;

    let header = AssetHeader {
        id: id.parse().map_err(|_| DbError::MappingError("bad asset id".into()))?,
        project_id: row.get(1)?,
        root_domain: row.get(2)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| DbError::MappingError(e.to_string()))?,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
        last_scan_time: parse_dt(&last_scan_time)?,
        task_name: row.get(7)?,
    };
    let kind: AssetKind = serde_json::from_str(&data_json).map_err(|e| DbError::MappingError(e.to_string()))?;
    Ok(Asset { header, kind })
}

fn map_relation_row(row: &Row) -> Result<AssetRelation, DbError> {
    let id: String = row.get(0)?;
    let src: String = row.get(2)?;
    let dst: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(AssetRelation {
        id: id.parse().map_err(|_| DbError::MappingError("bad relation id".into()))?,
        project_id: row.get(1)?,
        src_asset_id: src.parse().map_err(|_| DbError::MappingError("bad src id".into()))?,
        dst_asset_id: dst.parse().map_err(|_| DbError::MappingError("bad dst id".into()))?,
        relation_type: row.get(4)?,
        created_at: parse_dt(&created_at)?,
    })
}

fn parse_dt(s: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_text_is_stable_for_ports() {
        let key = NaturalKey::Port { project_id: "p".into(), ip: "10.0.0.1".into(), port: 443, protocol: "tcp".into() };
        assert_eq!(natural_key_text(&key), "10.0.0.1:443/tcp");
    }
}
