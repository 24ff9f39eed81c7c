// [libs/infra/worker-client/src/lib.rs]

//! HTTP client a scan worker uses to talk to the orchestrator: register,
//! poll for dispatched tasks, and report progress and results.

pub mod client;
pub mod errors;

pub use client::{SnapshotReport, WorkerClient};
pub use errors::ClientError;
