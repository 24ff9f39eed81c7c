// [libs/domain/store/src/errors.rs]

//! Errors raised by the in-memory authorities themselves, as opposed to the
//! durable-side [`scancore_infra_db::DbError`] or the domain error enums
//! re-exported from [`scancore_domain_models`].

use thiserror::Error;

use scancore_domain_models::error::ErrorKind;

/// Failures specific to the CSV/JSON export and import paths (§6.3).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("csv encoding failed: {0}")]
    CsvEncoding(String),

    #[error("csv decoding failed: {0}")]
    CsvDecoding(String),

    #[error("json encoding failed: {0}")]
    JsonEncoding(String),

    #[error("row {0} is missing a required column")]
    MissingColumn(usize),
}

impl From<&StoreError> for ErrorKind {
    fn from(e: &StoreError) -> Self {
        match e {
            StoreError::CsvEncoding(_) | StoreError::JsonEncoding(_) => ErrorKind::ScanError,
            StoreError::CsvDecoding(_) | StoreError::MissingColumn(_) => ErrorKind::BadRequest,
        }
    }
}
