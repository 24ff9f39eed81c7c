// [libs/domain/store/src/assets.rs]

//! In-memory authority over discovered assets (§4.5). Reads are served from
//! here; writes land here first and are fanned out to the durable store by
//! [`flush_daemon`] so a caller never waits on a database round trip.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, warn};
#[cfg(test)]
use uuid::Uuid;

use scancore_domain_models::asset::{Asset, AssetRelation, NaturalKey};
use scancore_infra_db::AssetRepository as DbAssetRepository;

use crate::errors::StoreError;

/// Write-behind queue depth before `upsert` starts logging drops. A full
/// channel never blocks the caller — see `swarm_telemetry.rs`'s bounded
/// logs for the same "ingest never waits on the sink" shape.
const WRITE_BEHIND_CAPACITY: usize = 4096;

/// The authoritative view of every discovered [`Asset`], keyed first by
/// variant then by natural key, mirroring the teacher's
/// `RwLock<HashMap<...>>` state-manager shape.
pub struct AssetRepository {
    assets: RwLock<HashMap<&'static str, HashMap<NaturalKey, Asset>>>,
    write_behind: Sender<Asset>,
}

impl AssetRepository {
    /// Builds a repository paired with the receiving half of its
    /// write-behind channel; pass the receiver to [`flush_daemon`].
    pub fn new() -> (Self, Receiver<Asset>) {
        let (write_behind, rx) = tokio::sync::mpsc::channel(WRITE_BEHIND_CAPACITY);
        (Self { assets: RwLock::new(HashMap::new()), write_behind }, rx)
    }

    /// Upserts one asset per §4.5's natural-key merge rule and returns the
    /// resulting record (the merged asset on a duplicate, the new one
    /// otherwise).
    pub fn upsert(&self, incoming: Asset) -> Asset {
        let key = incoming.kind.natural_key(&incoming.header);
        let variant = incoming.kind.variant_name();

        let merged = {
            let mut guard = self.assets.write().expect("asset repository lock poisoned");
            let bucket = guard.entry(variant).or_default();
            match bucket.get_mut(&key) {
                Some(existing) => {
                    existing.merge(incoming);
                    existing.clone()
                }
                None => {
                    bucket.insert(key, incoming.clone());
                    incoming
                }
            }
        };

        if let Err(e) = self.write_behind.try_send(merged.clone()) {
            warn!(asset_id = %merged.header.id, error = %e, "write-behind queue full, asset write delayed");
        }
        merged
    }

    /// Upserts a batch, preserving per-item merge semantics.
    pub fn batch_upsert(&self, assets: Vec<Asset>) -> Vec<Asset> {
        assets.into_iter().map(|a| self.upsert(a)).collect()
    }

    /// Looks up one asset by its natural key within a project.
    pub fn get(&self, variant: &str, key: &NaturalKey) -> Option<Asset> {
        self.assets.read().expect("asset repository lock poisoned").get(variant)?.get(key).cloned()
    }

    /// Lists every asset in `project_id`, optionally narrowed to one
    /// variant, newest-scanned first.
    pub fn list(&self, project_id: &str, variant: Option<&str>) -> Vec<Asset> {
        let guard = self.assets.read().expect("asset repository lock poisoned");
        let mut out: Vec<Asset> = match variant {
            Some(v) => guard.get(v).into_iter().flat_map(|m| m.values().cloned()).collect(),
            None => guard.values().flat_map(|m| m.values().cloned()).collect(),
        };
        out.retain(|a| a.header.project_id == project_id);
        out.sort_by(|a, b| b.header.last_scan_time.cmp(&a.header.last_scan_time));
        out
    }

    /// Per-variant counts within a project, for the cross-variant `ListAllAssets` contract.
    pub fn counts_by_variant(&self, project_id: &str) -> HashMap<&'static str, usize> {
        let guard = self.assets.read().expect("asset repository lock poisoned");
        guard
            .iter()
            .map(|(variant, bucket)| {
                (*variant, bucket.values().filter(|a| a.header.project_id == project_id).count())
            })
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn remove(&self, variant: &str, key: &NaturalKey) -> Option<Asset> {
        self.assets.write().expect("asset repository lock poisoned").get_mut(variant)?.remove(key)
    }
}

impl Default for AssetRepository {
    fn default() -> Self {
        Self::new().0
    }
}

/// Drains the write-behind channel into the durable store, one upsert at a
/// time, amortizing round trips the way `services/finding_flusher.rs`
/// drains `FindingVaultManager`. Runs until the sender half is dropped.
pub async fn flush_daemon(mut rx: Receiver<Asset>, db: DbAssetRepository) {
    while let Some(asset) = rx.recv().await {
        if let Err(e) = db.upsert(asset).await {
            warn!(error = %e, "failed to flush asset to durable store");
        } else {
            debug!("flushed asset to durable store");
        }
    }
}

/// Relations are written straight through to the durable store — there is
/// no in-memory authority for edges, only for the assets they connect.
pub async fn link(db: &DbAssetRepository, relation: &AssetRelation) -> Result<(), scancore_infra_db::DbError> {
    db.link(relation).await
}

/// Serializes `assets` to CSV, unioning the header across every row's
/// flattened JSON representation so heterogeneous variants share one sheet.
pub fn export_csv(assets: &[Asset]) -> Result<String, StoreError> {
    let rows: Vec<serde_json::Map<String, serde_json::Value>> = assets
        .iter()
        .map(|a| {
            let value = serde_json::to_value(a).map_err(|e| StoreError::JsonEncoding(e.to_string()))?;
            match value {
                serde_json::Value::Object(map) => Ok(map),
                _ => Err(StoreError::JsonEncoding("asset did not serialize to an object".into())),
            }
        })
        .collect::<Result<_, StoreError>>()?;

    let mut headers: Vec<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
    headers.sort();
    headers.dedup();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).map_err(|e| StoreError::CsvEncoding(e.to_string()))?;
    for row in &rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(h).map(scalar_to_csv_cell).unwrap_or_default())
            .collect();
        writer.write_record(&record).map_err(|e| StoreError::CsvEncoding(e.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|e| StoreError::CsvEncoding(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StoreError::CsvEncoding(e.to_string()))
}

fn scalar_to_csv_cell(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Serializes `assets` to a JSON array, the simpler of the two §6.3 export formats.
pub fn export_json(assets: &[Asset]) -> Result<String, StoreError> {
    serde_json::to_string(assets).map_err(|e| StoreError::JsonEncoding(e.to_string()))
}

/// Parses a JSON array of assets previously produced by [`export_json`].
pub fn import_json(body: &str) -> Result<Vec<Asset>, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::CsvDecoding(e.to_string()))
}

/// Parses a CSV sheet previously produced by [`export_csv`] back into assets.
pub fn import_csv(body: &str) -> Result<Vec<Asset>, StoreError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader.headers().map_err(|e| StoreError::CsvDecoding(e.to_string()))?.clone();
    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| StoreError::CsvDecoding(e.to_string()))?;
        let mut map = serde_json::Map::new();
        for (col, value) in headers.iter().zip(record.iter()) {
            if value.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            map.insert(col.to_string(), parsed);
        }
        let asset: Asset = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|_| StoreError::MissingColumn(idx))?;
        out.push(asset);
    }
    Ok(out)
}

/// Timestamp helper kept here rather than inlined at every call site — used
/// by handlers building a fresh [`scancore_domain_models::asset::AssetHeader`].
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use scancore_domain_models::asset::{AssetHeader, AssetKind, IpAsset};

    use super::*;

    fn asset(project_id: &str, ip: &str) -> Asset {
        let now = Utc::now();
        Asset {
            header: AssetHeader {
                id: Uuid::new_v4(),
                project_id: project_id.into(),
                root_domain: "example.com".into(),
                tags: BTreeSet::new(),
                created_at: now,
                updated_at: now,
                last_scan_time: now,
                task_name: None,
            },
            kind: AssetKind::Ip(IpAsset { ip: ip.into(), asn: None, isp: None, location: None, fingerprint: None }),
        }
    }

    #[test]
    fn duplicate_natural_key_merges_instead_of_duplicating() {
        let (repo, _rx) = AssetRepository::new();
        repo.upsert(asset("proj-a", "1.2.3.4"));
        repo.upsert(asset("proj-a", "1.2.3.4"));
        assert_eq!(repo.list("proj-a", Some("ip")).len(), 1);
    }

    #[test]
    fn distinct_projects_do_not_collide() {
        let (repo, _rx) = AssetRepository::new();
        repo.upsert(asset("proj-a", "1.2.3.4"));
        repo.upsert(asset("proj-b", "1.2.3.4"));
        assert_eq!(repo.list("proj-a", None).len(), 1);
        assert_eq!(repo.list("proj-b", None).len(), 1);
    }

    #[test]
    fn csv_json_round_trip_preserves_asset_count() {
        let a = vec![asset("proj-a", "1.2.3.4"), asset("proj-a", "5.6.7.8")];
        let json = export_json(&a).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.len(), 2);

        let csv_body = export_csv(&a).unwrap();
        let back_csv = import_csv(&csv_body).unwrap();
        assert_eq!(back_csv.len(), 2);
    }
}
