//! Shared entity and configuration types for the scanning core: tasks,
//! assets, nodes, schedules, page-monitoring artifacts, and sessions. One
//! module per aggregate; this crate carries no behavior beyond what each
//! type needs to uphold its own invariants.

pub mod asset;
pub mod error;
pub mod monitoring;
pub mod node;
pub mod queue;
pub mod schedule;
pub mod session;
pub mod task;

pub use asset::{Asset, AssetHeader, AssetKind, AssetRelation, NaturalKey};
pub use error::{CoreError, ErrorEnvelope, ErrorKind};
pub use monitoring::{ChangeStatus, DiffType, PageChange, PageSnapshot};
pub use node::{Node, NodeError, NodeMetrics, NodeRole, NodeStatus};
pub use queue::{QueueConfig, QueuedTask};
pub use schedule::ScheduleRule;
pub use session::{Session, SessionError, SessionStatus};
pub use task::{
    PageMonitorConfig, PortScanConfig, PortScanMethod, SubdomainConfig, Task, TaskConfig, TaskError,
    TaskResult, TaskStatus, TaskSummary, TaskType, TargetSummary,
};
