// [apps/orchestrator/src/kernel.rs]

//! Composition root: wires the durable repositories, the in-memory
//! authorities, and the background daemons together, then serves the
//! HTTP API. Grounded on the teacher's `kernel.rs` ignite/launch split.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tracing::{error, info, instrument};

use scancore_domain_engines::MonitorScheduler;
use scancore_domain_models::asset::Asset;
use scancore_domain_models::queue::QueueConfig;
use scancore_domain_models::task::TaskType;
use scancore_domain_store::notify::{LogChannel, NotificationChannel, WebhookChannel};
use scancore_domain_store::{AssetRepository, NodeRegistry, SessionStore, TaskQueue};
use scancore_infra_db::{
    AssetRepository as DbAssetRepository, DbClient, MonitoringRepository, NodeRepository, ScheduleRepository,
    SessionRepository, TaskRepository,
};

use crate::routes::build_router;
use crate::services::{dispatcher, heartbeat_sweeper, monitor_poller, retry_sweeper, scheduler};

/// Default concurrency ceiling for [`MonitorScheduler`]'s worker semaphore
/// when `MONITOR_MAX_CONCURRENT` isn't set.
const DEFAULT_MONITOR_CONCURRENCY: usize = 8;

/// Base retry interval for [`scancore_domain_store::notify::dispatch`],
/// the same order of magnitude as `services/retry_sweeper.rs`'s
/// `BASE_RETRY_SECS`.
const NOTIFY_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Shared application state every handler and background daemon closes
/// over. Cloning is cheap — every field is itself an `Arc` or an
/// internally-synchronized store.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub tasks_db: Arc<TaskRepository>,
    pub nodes_db: Arc<NodeRepository>,
    pub sessions_db: Arc<SessionRepository>,
    pub schedules_db: Arc<ScheduleRepository>,
    pub monitoring_db: Arc<MonitoringRepository>,
    pub assets_db: Arc<DbAssetRepository>,

    pub task_queue: Arc<TaskQueue>,
    pub node_registry: Arc<NodeRegistry>,
    pub session_store: Arc<SessionStore>,
    pub asset_store: Arc<AssetRepository>,
    pub monitor_scheduler: Arc<MonitorScheduler>,

    pub worker_auth_token: Arc<String>,

    /// Outbound destination for [`scancore_domain_store::notify`] events;
    /// falls back to [`LogChannel`] when no webhook is configured so
    /// `dispatch` never silently drops an event.
    pub notify_channel: Arc<dyn NotificationChannel>,
    pub notify_retry_interval: Duration,
}

pub struct OrchestratorKernel {
    port: u16,
    state: AppState,
    asset_write_behind_rx: Receiver<Asset>,
}

impl OrchestratorKernel {
    #[instrument(skip(auth_token, worker_auth_token))]
    pub async fn ignite(
        database_url: &str,
        auth_token: Option<String>,
        port: u16,
        worker_auth_token: String,
        notify_webhook_url: Option<String>,
    ) -> Self {
        let db = DbClient::connect(database_url, auth_token)
            .await
            .expect("database connection failed; ignition aborted");

        let tasks_db = Arc::new(TaskRepository::new(db.connection().expect("db connection")));
        let nodes_db = Arc::new(NodeRepository::new(db.connection().expect("db connection")));
        let sessions_db = Arc::new(SessionRepository::new(db.connection().expect("db connection")));
        let schedules_db = Arc::new(ScheduleRepository::new(db.connection().expect("db connection")));
        let monitoring_db = Arc::new(MonitoringRepository::new(db.connection().expect("db connection")));
        let assets_db = Arc::new(DbAssetRepository::new(db.connection().expect("db connection")));

        let mut queue_configs = HashMap::new();
        queue_configs.insert(TaskType::SubdomainEnum, QueueConfig::default());
        queue_configs.insert(TaskType::PortScan, QueueConfig::default());
        queue_configs.insert(TaskType::PageMonitor, QueueConfig::default());
        queue_configs.insert(TaskType::VulnScan, QueueConfig::default());

        let (asset_store, asset_write_behind_rx) = AssetRepository::new();

        let notify_channel: Arc<dyn NotificationChannel> = match notify_webhook_url {
            Some(url) => Arc::new(WebhookChannel::new(url)),
            None => Arc::new(LogChannel),
        };

        let state = AppState {
            db,
            tasks_db,
            nodes_db,
            sessions_db,
            schedules_db,
            monitoring_db,
            assets_db,
            task_queue: Arc::new(TaskQueue::new(queue_configs)),
            node_registry: Arc::new(NodeRegistry::new()),
            session_store: Arc::new(SessionStore::new()),
            asset_store: Arc::new(asset_store),
            monitor_scheduler: Arc::new(MonitorScheduler::new(DEFAULT_MONITOR_CONCURRENCY)),
            worker_auth_token: Arc::new(worker_auth_token),
            notify_channel,
            notify_retry_interval: NOTIFY_RETRY_INTERVAL,
        };

        Self { port, state, asset_write_behind_rx }
    }

    pub async fn launch(self) {
        let state = self.state;

        let flush_db = DbAssetRepository::new(state.db.connection().expect("db connection"));
        tokio::spawn(scancore_domain_store::assets::flush_daemon(self.asset_write_behind_rx, flush_db));

        tokio::spawn(scheduler::run(state.clone()));
        tokio::spawn(dispatcher::run(state.clone()));
        tokio::spawn(retry_sweeper::run(state.clone()));
        tokio::spawn(heartbeat_sweeper::run(state.clone()));
        tokio::spawn(monitor_poller::run(state.clone()));

        let router = build_router(state);
        let bind_address = SocketAddr::from(([0, 0, 0, 0], self.port));

        info!(%bind_address, "orchestrator listening");
        let listener = tokio::net::TcpListener::bind(bind_address).await.expect("failed to bind listening port");

        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "server loop exited");
            std::process::exit(1);
        }
    }
}
