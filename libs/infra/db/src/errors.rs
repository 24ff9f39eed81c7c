// [libs/infra/db/src/errors.rs]

//! Error catalog for the persistence layer.

use thiserror::Error;

use scancore_domain_models::error::ErrorKind;

/// Failure modes surfaced by `scancore-infra-db`.
#[derive(Error, Debug)]
pub enum DbError {
    /// Physical or network failure talking to the libsql backend.
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    /// Missing or malformed connection configuration (empty URL, no token).
    #[error("database configuration invalid: {0}")]
    ConfigurationError(String),

    /// Error returned by the libsql driver itself.
    #[error("query rejected: {0}")]
    QueryError(#[from] libsql::Error),

    /// A row could not be mapped into a domain type.
    #[error("row mapping failed: {0}")]
    MappingError(String),

    /// A multi-statement transaction failed to commit.
    #[error("transaction failed to commit")]
    TransactionError,

    /// The requested task does not exist.
    #[error("task not found")]
    TaskNotFound,

    /// The requested node does not exist.
    #[error("node not found")]
    NodeNotFound,

    /// The requested session does not exist or has already expired.
    #[error("session not found or expired")]
    SessionNotFound,

    /// The requested schedule rule does not exist.
    #[error("schedule rule not found")]
    ScheduleNotFound,
}

impl From<&DbError> for ErrorKind {
    fn from(err: &DbError) -> Self {
        match err {
            DbError::ConnectionError(_) => ErrorKind::DatabaseError,
            DbError::ConfigurationError(_) => ErrorKind::DatabaseError,
            DbError::QueryError(_) => ErrorKind::DatabaseError,
            DbError::MappingError(_) => ErrorKind::DatabaseError,
            DbError::TransactionError => ErrorKind::DatabaseError,
            DbError::TaskNotFound => ErrorKind::NotFound,
            DbError::NodeNotFound => ErrorKind::NodeNotFound,
            DbError::SessionNotFound => ErrorKind::NotFound,
            DbError::ScheduleNotFound => ErrorKind::NotFound,
        }
    }
}
