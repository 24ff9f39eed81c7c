// [apps/orchestrator/src/main.rs]

//! Binary entry point: loads `.env`, parses CLI overrides, initializes
//! tracing, and ignites the kernel.

use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use scancore_orchestrator::kernel::OrchestratorKernel;

#[derive(Debug, Parser)]
#[command(name = "orchestrator", about = "Task Manager: HTTP API, scheduler, dispatcher")]
struct Args {
    /// Turso/libsql connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Turso auth token, unset for a local file-backed database.
    #[arg(long, env = "TURSO_AUTH_TOKEN")]
    database_token: Option<String>,

    /// Port the HTTP API listens on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Shared secret worker nodes authenticate with.
    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    worker_auth_token: String,

    /// Webhook URL the notification fan-out POSTs events to (§4.8);
    /// omitted entirely when unset so the fan-out falls back to logging
    /// rather than pointing at a placeholder endpoint.
    #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
    notify_webhook_url: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();

    scancore_telemetry::init_tracing("scancore_orchestrator");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        info!(port = args.port, "orchestrator igniting");
        let kernel = OrchestratorKernel::ignite(
            &args.database_url,
            args.database_token,
            args.port,
            args.worker_auth_token,
            args.notify_webhook_url,
        )
        .await;
        kernel.launch().await;
    });

    Ok(())
}
