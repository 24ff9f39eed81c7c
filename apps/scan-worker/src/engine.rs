// [apps/scan-worker/src/engine.rs]

//! Poll-execute-report cycle a worker node runs against the orchestrator:
//! claim a task, dispatch it to whichever scan engine matches its kind,
//! stream discovered assets and progress back, and report the terminal
//! result. Grounded on the teacher's `MinerEngine::ignite_sovereign_
//! operations`/`execute_mission_lifecycle` poll-loop shape, generalized
//! from one hardcoded mining strategy to the three dispatchable engines.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use scancore_domain_engines::monitor::MonitorEngine;
use scancore_domain_engines::portscan::{parse_ports, PortResult, PortScanEngine, PortStatus};
use scancore_domain_engines::shared::{EngineVerdict, ResultSink};
use scancore_domain_engines::subdomain::{CertTransparencySource, SubdomainEngine, SubdomainResult, SubdomainSource};
use scancore_domain_models::asset::{Asset, AssetHeader, AssetKind, PortAsset, SubdomainAsset};
use scancore_domain_models::task::{PortScanConfig, SubdomainConfig, Task, TaskConfig, TargetSummary, TaskResult};
use scancore_infra_worker_client::{SnapshotReport, WorkerClient};

use crate::host_metrics::WorkerActivity;

const POLL_IDLE_BACKOFF: Duration = Duration::from_secs(5);
const PROGRESS_REPORT_INTERVAL: Duration = Duration::from_secs(2);
/// Public certificate-transparency log aggregator used by default (§4.2);
/// a `SubdomainConfig` has no per-task override for it in this core.
const CT_BASE_URL: &str = "https://crt.sh";

pub struct ScanWorkerEngine {
    client: Arc<WorkerClient>,
    node_id: Uuid,
    activity: Arc<WorkerActivity>,
    passive_source: Option<(String, Option<String>)>,
    shutdown: Arc<AtomicBool>,
}

impl ScanWorkerEngine {
    pub fn new(
        client: Arc<WorkerClient>,
        node_id: Uuid,
        activity: Arc<WorkerActivity>,
        passive_source: Option<(String, Option<String>)>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self { client, node_id, activity, passive_source, shutdown }
    }

    /// The worker's main loop: poll for a dispatched task, run it to
    /// completion, report back, repeat. Backs off `POLL_IDLE_BACKOFF` when
    /// nothing is queued or the poll itself fails.
    #[instrument(skip(self), fields(node = %self.node_id))]
    pub async fn run(&self) {
        info!("worker poll loop starting");
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.client.poll_for_task(self.node_id).await {
                Ok(Some(task)) => {
                    self.activity.task_started();
                    if let Err(e) = self.execute_task(&task).await {
                        error!(task_id = %task.id, error = %e, "task execution failed");
                    }
                    self.activity.task_finished();
                }
                Ok(None) => sleep(POLL_IDLE_BACKOFF).await,
                Err(e) => {
                    warn!(error = %e, "poll for task failed, backing off");
                    sleep(POLL_IDLE_BACKOFF).await;
                }
            }
        }
        info!("worker poll loop stopped");
    }

    #[instrument(skip(self), fields(task_id = %task.id, kind = ?task.kind))]
    async fn execute_task(&self, task: &Task) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let root_domain = task.targets.first().cloned().unwrap_or_default();

        let (assets, result) = match &task.config {
            TaskConfig::SubdomainEnum(config) => self.run_subdomain(task, &root_domain, config, cancel).await,
            TaskConfig::PortScan(config) => self.run_portscan(task, &root_domain, config, cancel).await?,
            TaskConfig::PageMonitor(_) => self.run_monitor(task).await?,
        };

        if !assets.is_empty() {
            if let Err(e) = self.client.submit_assets(&assets).await {
                warn!(task_id = %task.id, error = %e, "asset submission failed, continuing to report result");
            }
        }
        self.client.submit_result(&result).await?;
        info!(task_id = %task.id, finding_count = result.finding_count, "task result reported");
        Ok(())
    }

    async fn run_subdomain(
        &self,
        task: &Task,
        root_domain: &str,
        config: &SubdomainConfig,
        cancel: CancellationToken,
    ) -> (Vec<Asset>, TaskResult) {
        let collector = Arc::new(Collector::<SubdomainResult>::default());
        let mut sources: Vec<Box<dyn SubdomainSource>> = vec![Box::new(CertTransparencySource::new(CT_BASE_URL))];
        if let Some((url, api_key)) = &self.passive_source {
            sources.push(Box::new(scancore_domain_engines::subdomain::PassiveSource::new(
                "passive",
                url.clone(),
                api_key.clone(),
            )));
        }

        let outcome = SubdomainEngine::run(root_domain, config, collector.as_ref(), cancel, &sources).await;
        let _ = self.client.report_progress(task.id, 1.0).await;

        let items = collector.take();
        let assets: Vec<Asset> = items.iter().map(|r| subdomain_asset(task, root_domain, r)).collect();
        let summary = TargetSummary {
            target: root_domain.to_string(),
            findings: assets.len() as u64,
            status: verdict_label(outcome.verdict).to_string(),
        };
        let result = TaskResult {
            task_id: task.id,
            finding_count: assets.len() as u64,
            error: (outcome.verdict == EngineVerdict::Failed).then(|| "subdomain enumeration failed".to_string()),
            per_target: vec![summary],
            asset_ids: assets.iter().map(|a| a.header.id).collect(),
        };
        (assets, result)
    }

    async fn run_portscan(
        &self,
        task: &Task,
        root_domain: &str,
        config: &PortScanConfig,
        cancel: CancellationToken,
    ) -> anyhow::Result<(Vec<Asset>, TaskResult)> {
        let ports = parse_ports(&config.ports)?;
        let total = (config.targets.len() * ports.len()).max(1) as f64;

        let collector = Arc::new(Collector::<PortResult>::default());
        let reporter = spawn_progress_reporter(self.client.clone(), task.id, {
            let collector = collector.clone();
            move || (collector.count() as f64 / total).min(0.99)
        });

        let outcome = PortScanEngine::run(config, collector.as_ref(), cancel).await?;
        reporter.stop().await;
        let _ = self.client.report_progress(task.id, 1.0).await;

        let items = collector.take();
        let assets: Vec<Asset> = items
            .iter()
            .filter(|r| r.status == PortStatus::Open)
            .map(|r| port_asset(task, root_domain, r))
            .collect();
        let summary = TargetSummary {
            target: root_domain.to_string(),
            findings: assets.len() as u64,
            status: verdict_label(outcome.verdict).to_string(),
        };
        let result = TaskResult {
            task_id: task.id,
            finding_count: assets.len() as u64,
            error: (outcome.verdict == EngineVerdict::Failed).then(|| "port scan failed".to_string()),
            per_target: vec![summary],
            asset_ids: assets.iter().map(|a| a.header.id).collect(),
        };
        Ok((assets, result))
    }

    /// Page monitoring produces a [`PageSnapshot`](scancore_domain_models::monitoring::PageSnapshot)
    /// / [`PageChange`](scancore_domain_models::monitoring::PageChange) pair
    /// rather than an Asset Repository entry — there is no discovered
    /// entity here, only a change observation (§4.4).
    async fn run_monitor(&self, task: &Task) -> anyhow::Result<(Vec<Asset>, TaskResult)> {
        let TaskConfig::PageMonitor(config) = &task.config else { unreachable!("dispatched as a monitor task") };

        let previous = self.client.latest_snapshot(task.id).await.ok().flatten();
        let engine = MonitorEngine::new();
        let check = engine.check_once(config, previous.as_ref().map(|s| s.html.as_str())).await?;

        let diff_summary = check.diff.as_ref().map(|d| serde_json::to_string(d).unwrap_or_default());
        self.client
            .submit_snapshot(
                task.id,
                SnapshotReport {
                    url: config.url.clone(),
                    status_code: check.status_code,
                    headers: config.headers.clone(),
                    html: check.raw_body,
                    extracted_text: check.extracted_text,
                    content_hash: check.content_hash.clone(),
                    size_bytes: check.size_bytes,
                    load_time_ms: check.load_time_ms,
                    similarity_score: check.similarity_score,
                    diff_summary,
                    changed: check.changed,
                },
            )
            .await?;
        let _ = self.client.report_progress(task.id, 1.0).await;

        let summary = TargetSummary {
            target: config.url.clone(),
            findings: u64::from(check.changed),
            status: "completed".to_string(),
        };
        let result = TaskResult {
            task_id: task.id,
            finding_count: u64::from(check.changed),
            error: None,
            per_target: vec![summary],
            asset_ids: Vec::new(),
        };
        Ok((Vec::new(), result))
    }
}

fn verdict_label(verdict: EngineVerdict) -> &'static str {
    match verdict {
        EngineVerdict::Completed => "completed",
        EngineVerdict::Cancelled => "cancelled",
        EngineVerdict::Failed => "failed",
    }
}

fn header(task: &Task, root_domain: &str) -> AssetHeader {
    let now = chrono::Utc::now();
    AssetHeader {
        id: Uuid::new_v4(),
        project_id: task.project_id.clone(),
        root_domain: root_domain.to_string(),
        tags: Default::default(),
        created_at: now,
        updated_at: now,
        last_scan_time: now,
        task_name: Some(task.id.to_string()),
    }
}

fn subdomain_asset(task: &Task, root_domain: &str, result: &SubdomainResult) -> Asset {
    Asset {
        header: header(task, root_domain),
        kind: AssetKind::Subdomain(SubdomainAsset {
            host: result.host.clone(),
            ips: result.ips.clone(),
            cname: None,
            dns_type: None,
            dns_values: Vec::new(),
            takeover_suspected: false,
        }),
    }
}

fn port_asset(task: &Task, root_domain: &str, result: &PortResult) -> Asset {
    let tls = result.service.as_deref().is_some_and(|s| s.contains("ssl") || s.contains("tls") || s == "https");
    Asset {
        header: header(task, root_domain),
        kind: AssetKind::Port(PortAsset {
            ip: result.ip.clone(),
            host: Some(result.host.clone()),
            port: result.port,
            protocol: result.protocol.to_string(),
            service: result.service.clone(),
            version: result.version.clone(),
            banner: result.banner.clone(),
            tls,
            status: format!("{:?}", result.status).to_lowercase(),
        }),
    }
}

/// Thread-safe sink that simply accumulates every emitted item, plus a
/// running count a progress reporter can sample without locking the vec.
struct Collector<T> {
    items: std::sync::Mutex<Vec<T>>,
    count: AtomicU64,
}

impl<T> Default for Collector<T> {
    fn default() -> Self {
        Self { items: std::sync::Mutex::new(Vec::new()), count: AtomicU64::new(0) }
    }
}

impl<T> Collector<T> {
    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn take(&self) -> Vec<T> {
        std::mem::take(&mut self.items.lock().expect("collector lock poisoned"))
    }
}

impl<T: Send> ResultSink<T> for Collector<T> {
    fn emit(&self, item: T) {
        self.items.lock().expect("collector lock poisoned").push(item);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

struct ProgressReporterHandle {
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ProgressReporterHandle {
    async fn stop(self) {
        self.done.store(true, Ordering::Relaxed);
        let _ = self.handle.await;
    }
}

/// Periodically reports `fraction()` to the orchestrator until [`stop`](ProgressReporterHandle::stop)
/// is called, implementing §4.3's "publish progress at a steady cadence"
/// without coupling the engine's hot loop to the network call.
fn spawn_progress_reporter<F>(client: Arc<WorkerClient>, task_id: Uuid, fraction: F) -> ProgressReporterHandle
where
    F: Fn() -> f64 + Send + 'static,
{
    let done = Arc::new(AtomicBool::new(false));
    let done_for_task = done.clone();
    let handle = tokio::spawn(async move {
        while !done_for_task.load(Ordering::Relaxed) {
            sleep(PROGRESS_REPORT_INTERVAL).await;
            if done_for_task.load(Ordering::Relaxed) {
                break;
            }
            let value = fraction();
            if let Err(e) = client.report_progress(task_id, value).await {
                debug!(%task_id, error = %e, "progress report skipped");
            }
        }
    });
    ProgressReporterHandle { done, handle }
}
