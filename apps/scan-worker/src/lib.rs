// [apps/scan-worker/src/lib.rs]

//! Worker library root: the poll-execute-report engine and host metrics
//! sampler the binary composes in `main.rs`.

pub mod engine;
pub mod host_metrics;

pub use engine::ScanWorkerEngine;
pub use host_metrics::WorkerActivity;
