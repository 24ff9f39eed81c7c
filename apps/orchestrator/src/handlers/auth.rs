// [apps/orchestrator/src/handlers/auth.rs]

//! Session lifecycle (§4.7, §6.1): login issues a token, logout revokes it,
//! verify reports whether a token is still valid without consuming it.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ApiEnvelope, AppError};
use crate::kernel::AppState;
use crate::middleware::{session_ttl, CallerIdentity};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<ApiEnvelope<LoginResponse>, AppError> {
    let session = state.session_store.create(body.user_id, body.roles, session_ttl());
    state.sessions_db.upsert(&session).await?;
    Ok(ApiEnvelope::ok(LoginResponse { token: session.token, expires_at: session.expires_at }))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub token: String,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> Result<ApiEnvelope<()>, AppError> {
    state.session_store.revoke(&body.token);
    state.sessions_db.delete(&body.token).await?;
    Ok(ApiEnvelope::ok(()))
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub subject: String,
    pub roles: Vec<String>,
}

pub async fn verify(Extension(identity): Extension<CallerIdentity>) -> ApiEnvelope<VerifyResponse> {
    ApiEnvelope::ok(VerifyResponse { subject: identity.subject, roles: identity.roles })
}
