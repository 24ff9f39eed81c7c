// [libs/domain/scan-engines/src/lib.rs]

//! Subdomain enumeration, port scanning, and page monitoring engines
//! (§4.2-§4.4): the three scan implementations a worker dispatches
//! into, sharing the `ResultSink`/`EngineOutcome`/`ProgressThrottle`
//! vocabulary in [`shared`].

pub mod errors;
pub mod monitor;
pub mod portscan;
pub mod shared;
pub mod subdomain;

pub use errors::EngineError;
pub use monitor::{DueMonitor, MonitorEngine, MonitorResult, MonitorScheduler};
pub use portscan::{PortResult, PortScanEngine, PortStatus};
pub use shared::{EngineOutcome, EngineVerdict, ProgressThrottle, ResultSink, RunTimer};
pub use subdomain::{SubdomainEngine, SubdomainResult};
