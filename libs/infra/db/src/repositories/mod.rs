// [libs/infra/db/src/repositories/mod.rs]

//! One repository per durable aggregate. Each wraps its own [`libsql::Connection`]
//! and owns the SQL for its table(s); nothing outside this module issues raw
//! queries against the schema.

pub mod asset;
pub mod monitoring;
pub mod node;
pub mod schedule;
pub mod session;
pub mod task;

pub use asset::AssetRepository;
pub use monitoring::MonitoringRepository;
pub use node::NodeRepository;
pub use schedule::ScheduleRepository;
pub use session::SessionRepository;
pub use task::TaskRepository;
