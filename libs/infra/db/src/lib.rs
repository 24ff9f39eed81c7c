// [libs/infra/db/src/lib.rs]

//! libsql-backed durable persistence for the scan core: tasks, assets,
//! nodes, schedule rules, sessions, and page-monitoring artifacts.
//!
//! [`DbClient::connect`] opens the database and applies [`schema`]
//! migrations; every [`repositories`] type then opens its own connection
//! from the client and owns the SQL for its table(s).

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{
    AssetRepository, MonitoringRepository, NodeRepository, ScheduleRepository, SessionRepository,
    TaskRepository,
};
