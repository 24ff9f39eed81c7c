use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error taxonomy shared by every crate and transported as `code` in
/// the API response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    QueueFull,
    TaskRunning,
    TaskCompleted,
    NodeOffline,
    NodeNotFound,
    ScanError,
    DatabaseError,
    RedisError,
    NetworkError,
    PluginError,
}

impl ErrorKind {
    /// HTTP status this kind maps to at the API boundary.
    pub fn http_status(self) -> u16 {
        use ErrorKind::*;
        match self {
            BadRequest => 400,
            Unauthorized => 401,
            Forbidden => 403,
            NotFound => 404,
            Conflict | QueueFull | TaskRunning | TaskCompleted => 409,
            NodeOffline | NodeNotFound | ScanError | DatabaseError | RedisError | NetworkError
            | PluginError => 500,
        }
    }

    /// Whether the Task Manager should reschedule on this kind rather than
    /// mark the task terminally failed (§7 propagation policy).
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::QueueFull
                | ErrorKind::NodeOffline
                | ErrorKind::DatabaseError
                | ErrorKind::RedisError
                | ErrorKind::NetworkError
        )
    }
}

/// A typed error carrying a stable [`ErrorKind`] and a caller-facing message.
/// The original cause, if any, is kept only for logging — it is never
/// serialized, per §7's "end users see the message, not the cause chain."
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), cause: None }
    }

    pub fn wrap(
        kind: ErrorKind,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, message: message.into(), cause: Some(Box::new(cause)) }
    }
}

/// Serialized shape of a [`CoreError`] in the `{code, message, data}` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CoreError> for ErrorEnvelope {
    fn from(e: &CoreError) -> Self {
        Self { code: e.kind.http_status(), kind: e.kind, message: e.message.clone() }
    }
}
