// [apps/orchestrator/src/errors.rs]

//! The single place that maps every crate's local error into the HTTP
//! response envelope (§6, §7): `{code, message, data}`, `code` carrying
//! the stable [`ErrorKind`] taxonomy's HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use scancore_domain_engines::EngineError;
use scancore_domain_models::error::{CoreError, ErrorEnvelope, ErrorKind};
use scancore_domain_models::node::NodeError;
use scancore_domain_models::session::SessionError;
use scancore_domain_models::task::TaskError;
use scancore_domain_store::StoreError;
use scancore_infra_db::DbError;

#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { code: 200, message: "ok".to_string(), data: Some(data) }
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Wraps a [`CoreError`] so handlers can `?`-propagate any crate's local
/// error type and axum renders the stable envelope automatically.
#[derive(Debug)]
pub struct AppError(pub CoreError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let envelope: ErrorEnvelope = (&self.0).into();
        let status = StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(envelope)).into_response()
    }
}

fn wrap<E: std::error::Error + Send + Sync + 'static>(kind: ErrorKind, e: E) -> AppError {
    AppError(CoreError::wrap(kind, e.to_string(), e))
}

impl From<TaskError> for AppError {
    fn from(e: TaskError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<NodeError> for AppError {
    fn from(e: NodeError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        wrap(ErrorKind::from(&e), e)
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError(e)
    }
}
