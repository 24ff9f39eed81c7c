// [libs/domain/store/src/lib.rs]

//! In-memory authorities the orchestrator reads and writes synchronously,
//! each paired with a durable counterpart in `scancore_infra_db` it writes
//! behind to: Asset Repository, Node Registry, Task Queue, Session Store,
//! and the Notification fan-out (§2 rows A, B, C, H, I).

pub mod assets;
pub mod errors;
pub mod notify;
pub mod nodes;
pub mod sessions;
pub mod tasks;

pub use assets::AssetRepository;
pub use errors::StoreError;
pub use nodes::NodeRegistry;
pub use sessions::SessionStore;
pub use tasks::TaskQueue;
