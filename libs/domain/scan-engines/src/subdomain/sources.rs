// [libs/domain/scan-engines/src/subdomain/sources.rs]

//! Certificate-transparency and passive-source lookups (§4.2), each a
//! pluggable adapter behind a `base_url` override so tests substitute a
//! local mock server instead of a hardcoded vendor.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::errors::EngineError;

/// One pluggable subdomain discovery source.
#[async_trait]
pub trait SubdomainSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn query(&self, root_domain: &str) -> Result<Vec<String>, EngineError>;
}

/// crt.sh-class certificate transparency log aggregator.
pub struct CertTransparencySource {
    client: reqwest::Client,
    base_url: String,
}

impl CertTransparencySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into() }
    }
}

#[derive(Deserialize)]
struct CtEntry {
    name_value: String,
}

#[async_trait]
impl SubdomainSource for CertTransparencySource {
    fn name(&self) -> &'static str {
        "cert_transparency"
    }

    #[instrument(skip(self))]
    async fn query(&self, root_domain: &str) -> Result<Vec<String>, EngineError> {
        let url = format!("{}/?q=%.{}&output=json", self.base_url, root_domain);
        let entries: Vec<CtEntry> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let mut hosts: Vec<String> = entries
            .into_iter()
            .flat_map(|e| e.name_value.lines().map(str::to_string).collect::<Vec<_>>())
            .filter(|h| !h.starts_with('*'))
            .collect();
        hosts.sort();
        hosts.dedup();
        Ok(hosts)
    }
}

/// SecurityTrails-class / VirusTotal-class passive DNS aggregator,
/// queried independently and merged at the call site per §4.2.
pub struct PassiveSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    label: &'static str,
}

impl PassiveSource {
    pub fn new(label: &'static str, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key, label }
    }
}

#[derive(Deserialize)]
struct PassiveResponse {
    subdomains: Vec<String>,
}

#[async_trait]
impl SubdomainSource for PassiveSource {
    fn name(&self) -> &'static str {
        self.label
    }

    #[instrument(skip(self))]
    async fn query(&self, root_domain: &str) -> Result<Vec<String>, EngineError> {
        let mut request = self.client.get(format!("{}/subdomains/{}", self.base_url, root_domain));
        if let Some(key) = &self.api_key {
            request = request.header("APIKEY", key);
        }
        let response: PassiveResponse =
            request.send().await.map_err(|e| EngineError::Network(e.to_string()))?.json().await.map_err(|e| {
                EngineError::Network(e.to_string())
            })?;
        Ok(response.subdomains.into_iter().map(|s| format!("{s}.{root_domain}")).collect())
    }
}
