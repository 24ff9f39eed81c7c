// [libs/infra/worker-client/src/client.rs]

//! HTTP uplink a worker node uses to register itself, poll for dispatched
//! work, and report progress and results back to the orchestrator (§6.1's
//! node-lifecycle and task endpoints, from the worker's side).

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, instrument};
use uuid::Uuid;

use std::collections::HashMap;

use scancore_domain_models::asset::Asset;
use scancore_domain_models::monitoring::PageSnapshot;
use scancore_domain_models::node::{NodeMetrics, NodeRole};
use scancore_domain_models::task::{Task, TaskResult};

use crate::errors::ClientError;

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    code: u16,
    #[allow(dead_code)]
    message: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct RegisterPayload<'a> {
    name: &'a str,
    role: NodeRole,
    tags: &'a [String],
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: Uuid,
}

#[derive(Serialize)]
struct HeartbeatPayload<'a> {
    metrics: &'a NodeMetrics,
}

/// A thin REST client bound to one orchestrator and authenticated as one
/// worker node.
pub struct WorkerClient {
    http: Client,
    base_url: String,
}

impl WorkerClient {
    /// Builds a client whose every request carries `Bearer {node_token}`.
    ///
    /// # Panics
    /// Panics if `node_token` is not a valid HTTP header value.
    pub fn new(base_url: impl Into<String>, node_token: &str) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {node_token}"))
            .expect("node token must be a valid header value");
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("scan-worker/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("worker HTTP client must build with default TLS config");

        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Registers this process as a node of `role` and returns its assigned id.
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str, role: NodeRole, tags: &[String]) -> Result<Uuid, ClientError> {
        let url = format!("{}/api/v1/nodes/register", self.base_url);
        let response = self.http.post(&url).json(&RegisterPayload { name, role, tags }).send().await?;
        let envelope: RegisterResponse = decode(response).await?;
        Ok(envelope.id)
    }

    /// Reports a heartbeat with current load metrics.
    #[instrument(skip(self, metrics))]
    pub async fn heartbeat(&self, node_id: Uuid, metrics: &NodeMetrics) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/nodes/{node_id}/heartbeat", self.base_url);
        let response = self.http.post(&url).json(&HeartbeatPayload { metrics }).send().await?;
        let _: Option<()> = decode_envelope(response).await?;
        Ok(())
    }

    /// Polls for a task dispatched to this node. Returns `None` if nothing
    /// is queued right now — the caller is expected to back off and retry.
    #[instrument(skip(self))]
    pub async fn poll_for_task(&self, node_id: Uuid) -> Result<Option<Task>, ClientError> {
        let url = format!("{}/api/v1/worker/tasks/next?node_id={node_id}", self.base_url);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode_envelope(response).await
    }

    /// Reports incremental progress for a running task.
    #[instrument(skip(self))]
    pub async fn report_progress(&self, task_id: Uuid, progress: f64) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/tasks/{task_id}/progress", self.base_url);
        #[derive(Serialize)]
        struct Payload {
            progress: f64,
        }
        let response = self.http.post(&url).json(&Payload { progress }).send().await?;
        let _: Option<()> = decode_envelope(response).await?;
        Ok(())
    }

    /// Submits the terminal result of a finished task.
    #[instrument(skip(self, result))]
    pub async fn submit_result(&self, result: &TaskResult) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/tasks/{}/results", self.base_url, result.task_id);
        let response = self.http.post(&url).json(result).send().await?;
        let _: Option<()> = decode_envelope(response).await?;
        Ok(())
    }

    /// Batch-uploads discovered assets ahead of (or alongside) the terminal
    /// [`TaskResult`], returning each asset after the orchestrator's
    /// natural-key merge (§4.5) so the caller can read back merged ids.
    #[instrument(skip(self, assets))]
    pub async fn submit_assets(&self, assets: &[Asset]) -> Result<Vec<Asset>, ClientError> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/v1/assets/batch", self.base_url);
        #[derive(Serialize)]
        struct Payload<'a> {
            assets: &'a [Asset],
        }
        let response = self.http.post(&url).json(&Payload { assets }).send().await?;
        decode(response).await
    }

    /// Fetches the most recent snapshot recorded for a page-monitor task, if
    /// any, so the engine has something to diff its fresh fetch against.
    #[instrument(skip(self))]
    pub async fn latest_snapshot(&self, monitor_id: Uuid) -> Result<Option<PageSnapshot>, ClientError> {
        let url = format!("{}/api/v1/monitoring/{monitor_id}/snapshot", self.base_url);
        let response = self.http.get(&url).send().await?;
        decode_envelope(response).await
    }

    /// Reports the snapshot just fetched, and — when it differs from the
    /// previous one — the similarity score and diff summary the engine
    /// computed for it.
    #[instrument(skip(self, snapshot))]
    pub async fn submit_snapshot(&self, monitor_id: Uuid, snapshot: SnapshotReport) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/monitoring/{monitor_id}/snapshot", self.base_url);
        let response = self.http.post(&url).json(&snapshot).send().await?;
        let _: Option<PageSnapshot> = decode_envelope(response).await?;
        Ok(())
    }
}

/// Payload for [`WorkerClient::submit_snapshot`] — everything the
/// orchestrator needs to persist a fetched page and, if it changed, the
/// change record linking it to the previous one.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub url: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub html: String,
    pub extracted_text: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub load_time_ms: u64,
    pub similarity_score: f64,
    pub diff_summary: Option<String>,
    pub changed: bool,
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    decode_envelope::<T>(response).await?.ok_or_else(|| ClientError::ServerRejection("empty response body".into()))
}

async fn decode_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>, ClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
        error!(%status, "orchestrator rejected request");
        return Err(ClientError::ServerRejection(format!("HTTP {status}")));
    }
    let envelope: ApiEnvelope<T> = response.json().await?;
    if envelope.code != 200 {
        return Err(ClientError::ServerRejection(format!("code {}", envelope.code)));
    }
    Ok(envelope.data)
}
