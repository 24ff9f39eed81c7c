// [libs/core/dedup/src/errors.rs]

use thiserror::Error;

/// Failures raised by the dedup filter. The filter itself never errors on
/// insert/contains; this enum exists for the sharded orchestrator's
/// construction-time checks.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Returned when the sharded filter is constructed with zero partitions.
    #[error("partition count must be at least 1")]
    NoShards,
}
