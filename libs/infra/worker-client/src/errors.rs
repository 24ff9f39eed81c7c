// [libs/infra/worker-client/src/errors.rs]

//! Errors surfaced by [`crate::WorkerClient`].

use thiserror::Error;

/// Failure modes talking to the orchestrator from a worker node.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The HTTP request itself failed (DNS, connect, TLS, timeout).
    #[error("network request failed: {0}")]
    NetworkFault(#[from] reqwest::Error),

    /// The orchestrator returned a non-2xx status.
    #[error("orchestrator rejected request: {0}")]
    ServerRejection(String),

    /// The orchestrator's response body didn't decode into the expected shape.
    #[error("response decoding failed: {0}")]
    DecodingFault(#[from] serde_json::Error),

    /// This node's session/token is no longer accepted.
    #[error("node credentials rejected or expired")]
    Unauthorized,
}
