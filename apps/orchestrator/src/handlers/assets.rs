// [apps/orchestrator/src/handlers/assets.rs]

//! Asset read/write surface (§4.5, §6.1): list within a project, ingest
//! one or many discovered entities.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use scancore_domain_models::asset::Asset;

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub project_id: String,
    #[serde(rename = "type")]
    pub variant: Option<String>,
}

pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<ListAssetsQuery>,
) -> ApiEnvelope<Vec<Asset>> {
    ApiEnvelope::ok(state.asset_store.list(&query.project_id, query.variant.as_deref()))
}

pub async fn create_asset(
    State(state): State<AppState>,
    Json(asset): Json<Asset>,
) -> Result<ApiEnvelope<Asset>, AppError> {
    Ok(ApiEnvelope::ok(state.asset_store.upsert(asset)))
}

#[derive(Debug, Deserialize)]
pub struct BatchAssetsRequest {
    pub assets: Vec<Asset>,
}

pub async fn batch_create_assets(
    State(state): State<AppState>,
    Json(body): Json<BatchAssetsRequest>,
) -> Result<ApiEnvelope<Vec<Asset>>, AppError> {
    Ok(ApiEnvelope::ok(state.asset_store.batch_upsert(body.assets)))
}
