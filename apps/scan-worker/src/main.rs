// [apps/scan-worker/src/main.rs]

//! Binary entry point: loads `.env`, parses CLI overrides, registers this
//! process as a node, and runs the heartbeat and poll loops until the
//! process receives a termination signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};

use scancore_domain_models::node::NodeRole;
use scancore_infra_worker_client::WorkerClient;
use scancore_scan_worker::{ScanWorkerEngine, WorkerActivity};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Parser)]
#[command(name = "scan-worker", about = "Worker node: polls for dispatched tasks and runs the scan engines")]
struct Args {
    /// Base URL of the orchestrator this node reports to.
    #[arg(long, env = "ORCHESTRATOR_URL")]
    orchestrator_url: String,

    /// Shared secret this node authenticates with.
    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    worker_auth_token: String,

    /// Display name this node registers under.
    #[arg(long, env = "WORKER_NODE_NAME", default_value = "scan-worker")]
    node_name: String,

    /// Comma-separated tags used for eligibility filtering (§4.1).
    #[arg(long, env = "WORKER_TAGS", value_delimiter = ',')]
    tags: Vec<String>,

    /// Base URL of an optional passive DNS aggregator for subdomain
    /// enumeration; omitted entirely when unset rather than pointed at a
    /// placeholder vendor.
    #[arg(long, env = "PASSIVE_SOURCE_URL")]
    passive_source_url: Option<String>,

    #[arg(long, env = "PASSIVE_SOURCE_API_KEY")]
    passive_source_api_key: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    scancore_telemetry::init_tracing("scancore_scan_worker");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(WorkerClient::new(args.orchestrator_url.clone(), &args.worker_auth_token));

    let node_id = client.register(&args.node_name, NodeRole::Worker, &args.tags).await?;
    info!(%node_id, name = %args.node_name, "node registered");

    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("termination requested, finishing current task and shutting down");
                shutdown.store(true, Ordering::SeqCst);
            }
        }
    });

    let activity = Arc::new(WorkerActivity::default());
    let heartbeat_handle = tokio::spawn(heartbeat_loop(client.clone(), node_id, activity.clone(), shutdown.clone()));

    let passive_source = args.passive_source_url.map(|url| (url, args.passive_source_api_key));
    let engine = ScanWorkerEngine::new(client, node_id, activity, passive_source, shutdown);
    engine.run().await;

    heartbeat_handle.abort();
    info!("worker shut down");
    Ok(())
}

async fn heartbeat_loop(
    client: Arc<WorkerClient>,
    node_id: uuid::Uuid,
    activity: Arc<WorkerActivity>,
    shutdown: Arc<AtomicBool>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        let metrics = activity.sample();
        if let Err(e) = client.heartbeat(node_id, &metrics).await {
            warn!(error = %e, "heartbeat failed");
        }
        tokio::time::sleep(HEARTBEAT_INTERVAL).await;
    }
}
