// [libs/domain/scan-engines/src/errors.rs]

//! Failure modes shared across the subdomain, port scan, and page
//! monitoring engines.

use thiserror::Error;

use scancore_domain_models::error::ErrorKind;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("network operation failed: {0}")]
    Network(String),

    #[error("dns resolution failed: {0}")]
    Dns(String),

    #[error("operation timed out")]
    Timeout,
}

impl From<&EngineError> for ErrorKind {
    fn from(e: &EngineError) -> Self {
        match e {
            EngineError::Config(_) => ErrorKind::BadRequest,
            EngineError::Network(_) | EngineError::Dns(_) | EngineError::Timeout => ErrorKind::ScanError,
        }
    }
}
