// [libs/domain/scan-engines/src/subdomain/mod.rs]

//! Subdomain enumeration (§4.2): DNS brute force, certificate transparency
//! and passive sources, wildcard suppression, and bounded recursive
//! re-enumeration. Grounded on `executor.rs`'s cancellation/accumulator
//! pair and `dictionary_engine.rs`'s per-item cancellation check, ported
//! from CPU-bound `rayon` batches to I/O-bound `tokio` tasks.

mod sources;

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::{Quota, RateLimiter};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use scancore_core_dedup::ShardedFilter;
use scancore_domain_models::task::SubdomainConfig;

use crate::errors::EngineError;
use crate::shared::{EngineOutcome, ProgressThrottle, ResultSink, RunTimer};

pub use sources::{CertTransparencySource, PassiveSource, SubdomainSource};

/// One discovered candidate (§4.2 contract).
#[derive(Debug, Clone, Serialize)]
pub struct SubdomainResult {
    pub host: String,
    pub ips: Vec<String>,
    pub source: String,
    pub resolved: bool,
    pub response_time_ms: u64,
    pub timestamp: chrono::DateTime<Utc>,
}

const DEFAULT_WORDLIST: &[&str] =
    &["www", "mail", "api", "dev", "staging", "admin", "vpn", "ftp", "cdn", "app", "test", "blog"];

pub struct SubdomainEngine;

impl SubdomainEngine {
    /// Enumerates subdomains of `root_domain` per `config`, publishing each
    /// surviving candidate to `sink` as it's confirmed. `sources` supplies
    /// the certificate-transparency and passive-source adapters; callers
    /// substitute mocks in tests.
    #[instrument(skip(config, sink, cancel, sources), fields(root_domain))]
    pub async fn run(
        root_domain: &str,
        config: &SubdomainConfig,
        sink: &dyn ResultSink<SubdomainResult>,
        cancel: CancellationToken,
        sources: &[Box<dyn SubdomainSource>],
    ) -> EngineOutcome {
        Self::run_depth(root_domain, config, sink, cancel, sources, config.max_depth).await
    }

    async fn run_depth(
        root_domain: &str,
        config: &SubdomainConfig,
        sink: &dyn ResultSink<SubdomainResult>,
        cancel: CancellationToken,
        sources: &[Box<dyn SubdomainSource>],
        depth_remaining: u32,
    ) -> EngineOutcome {
        let timer = RunTimer::start();
        let progress = ProgressThrottle::default();
        let exact_seen = Arc::new(std::sync::Mutex::new(HashSet::<String>::new()));
        let approx_seen = Arc::new(ShardedFilter::new(8, 4096, 0.001).expect("non-zero partition count"));

        let resolver = match build_resolver(&config.dns_servers) {
            Ok(r) => Arc::new(r),
            Err(e) => {
                warn!(error = %e, "resolver construction failed");
                return timer.finish(&cancel, true);
            }
        };

        let wildcard_ips = if config.enable_wildcard {
            detect_wildcard(&resolver, root_domain).await
        } else {
            None
        };

        let mut newly_discovered = Vec::new();

        if config.enum_methods.iter().any(|m| m == "dns_brute") {
            let discovered = dns_brute_force(
                root_domain,
                config,
                &resolver,
                wildcard_ips.as_deref(),
                &exact_seen,
                &approx_seen,
                sink,
                &progress,
                &timer,
                &cancel,
            )
            .await;
            newly_discovered.extend(discovered);
        }

        for source in sources {
            if cancel.is_cancelled() {
                break;
            }
            let label = source.name().to_string();
            match source.query(root_domain).await {
                Ok(hosts) => {
                    for host in hosts {
                        if !exact_seen.lock().expect("dedup lock poisoned").insert(host.clone()) {
                            continue;
                        }
                        approx_seen.insert(&host);
                        timer.record_unit();
                        newly_discovered.push(host.clone());
                        sink.emit(SubdomainResult {
                            host,
                            ips: Vec::new(),
                            source: label.clone(),
                            resolved: false,
                            response_time_ms: 0,
                            timestamp: Utc::now(),
                        });
                    }
                }
                Err(e) => warn!(source = %label, error = %e, "subdomain source query failed"),
            }
        }

        if config.verify_subdomains {
            verify_candidates(&newly_discovered, &resolver, config.timeout_secs, sink).await;
        }

        if config.enable_recursive && depth_remaining > 0 && !cancel.is_cancelled() {
            for host in &newly_discovered {
                let child_config = SubdomainConfig { target: host.clone(), ..config.clone() };
                Box::pin(Self::run_depth(
                    host,
                    &child_config,
                    sink,
                    cancel.child_token(),
                    sources,
                    depth_remaining - 1,
                ))
                .await;
            }
        }

        timer.finish(&cancel, false)
    }
}

fn build_resolver(servers: &[String]) -> Result<TokioAsyncResolver, EngineError> {
    if servers.is_empty() {
        return Ok(TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()));
    }
    let ips: Vec<IpAddr> = servers
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    if ips.is_empty() {
        return Err(EngineError::Config("no valid resolver server addresses".into()));
    }
    let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
    let config = ResolverConfig::from_parts(None, Vec::new(), group);
    Ok(TokioAsyncResolver::tokio(config, ResolverOpts::default()))
}

/// Resolves an unguessable random label under `root_domain`; if it
/// resolves, the IP set becomes the wildcard signature (§4.2).
async fn detect_wildcard(resolver: &TokioAsyncResolver, root_domain: &str) -> Option<Vec<IpAddr>> {
    let label: String = (0..20).map(|_| char::from(rand::thread_rng().gen_range(b'a'..=b'z'))).collect();
    let probe = format!("{label}.{root_domain}");
    match resolver.lookup_ip(probe).await {
        Ok(lookup) => {
            let ips: Vec<IpAddr> = lookup.iter().collect();
            if ips.is_empty() {
                None
            } else {
                debug!(count = ips.len(), "wildcard DNS signature detected");
                Some(ips)
            }
        }
        Err(_) => None,
    }
}

fn is_wildcard_artifact(ips: &[IpAddr], wildcard: Option<&[IpAddr]>) -> bool {
    match wildcard {
        Some(sig) if !ips.is_empty() => ips.iter().all(|ip| sig.contains(ip)),
        _ => false,
    }
}

#[allow(clippy::too_many_arguments)]
async fn dns_brute_force(
    root_domain: &str,
    config: &SubdomainConfig,
    resolver: &Arc<TokioAsyncResolver>,
    wildcard_ips: Option<&[IpAddr]>,
    exact_seen: &Arc<std::sync::Mutex<HashSet<String>>>,
    approx_seen: &Arc<ShardedFilter>,
    sink: &dyn ResultSink<SubdomainResult>,
    progress: &ProgressThrottle,
    timer: &RunTimer,
    cancel: &CancellationToken,
) -> Vec<String> {
    let words = load_wordlist(config.wordlist_path.as_deref());
    let total = words.len().max(1) as f64;
    let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1) as usize));
    let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
        std::num::NonZeroU32::new(config.rate_limit.max(1)).expect("rate_limit clamped to at least 1"),
    )));

    let mut set = tokio::task::JoinSet::new();
    let discovered = Arc::new(std::sync::Mutex::new(Vec::new()));
    let processed = Arc::new(std::sync::atomic::AtomicU64::new(0));

    for word in words {
        if cancel.is_cancelled() {
            break;
        }
        let host = format!("{word}.{root_domain}");
        if !approx_seen.contains(&host) {
            approx_seen.insert(&host);
        } else {
            continue;
        }

        let semaphore = Arc::clone(&semaphore);
        let limiter = Arc::clone(&limiter);
        let resolver = Arc::clone(resolver);
        let cancel = cancel.clone();
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let retries = config.max_retries;

        set.spawn(async move {
            let _permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            }?;
            limiter.until_ready().await;

            let started = std::time::Instant::now();
            for attempt in 0..=retries {
                if cancel.is_cancelled() {
                    return None;
                }
                match tokio::time::timeout(timeout, resolver.lookup_ip(host.clone())).await {
                    Ok(Ok(lookup)) => {
                        let ips: Vec<IpAddr> = lookup.iter().collect();
                        return Some((host, ips, started.elapsed().as_millis() as u64));
                    }
                    _ if attempt < retries => {
                        let jitter = rand::thread_rng().gen_range(50..250);
                        tokio::time::sleep(Duration::from_millis(jitter)).await;
                    }
                    _ => return None,
                }
            }
            None
        });
    }

    let mut completed = 0u64;
    while let Some(joined) = set.join_next().await {
        completed += 1;
        if progress.should_emit(completed as f64 / total) {
            debug!(progress = completed as f64 / total, "dns brute force progress");
        }
        let Ok(Some((host, ips, elapsed_ms))) = joined else { continue };
        if is_wildcard_artifact(&ips, wildcard_ips) {
            continue;
        }
        if !exact_seen.lock().expect("dedup lock poisoned").insert(host.clone()) {
            continue;
        }
        timer.record_unit();
        processed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        discovered.lock().expect("discovered lock poisoned").push(host.clone());
        sink.emit(SubdomainResult {
            host,
            ips: ips.into_iter().map(|ip| ip.to_string()).collect(),
            source: "dns_brute".into(),
            resolved: true,
            response_time_ms: elapsed_ms,
            timestamp: Utc::now(),
        });
    }

    Arc::try_unwrap(discovered).map(|m| m.into_inner().expect("discovered lock poisoned")).unwrap_or_default()
}

fn load_wordlist(path: Option<&str>) -> Vec<String> {
    match path.and_then(|p| std::fs::read_to_string(p).ok()) {
        Some(body) => body.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect(),
        None => DEFAULT_WORDLIST.iter().map(|s| s.to_string()).collect(),
    }
}

/// Re-resolves each candidate, suppressing it (emitting `resolved=false`
/// instead) when it no longer answers (§4.2 "Verification").
async fn verify_candidates(
    hosts: &[String],
    resolver: &TokioAsyncResolver,
    timeout_secs: u64,
    sink: &dyn ResultSink<SubdomainResult>,
) {
    let timeout = Duration::from_secs(timeout_secs.max(1));
    for host in hosts {
        let resolved = tokio::time::timeout(timeout, resolver.lookup_ip(host.clone())).await.is_ok();
        if !resolved {
            sink.emit(SubdomainResult {
                host: host.clone(),
                ips: Vec::new(),
                source: "verification".into(),
                resolved: false,
                response_time_ms: 0,
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_artifact_detection_is_subset_based() {
        let wildcard = vec!["1.2.3.4".parse().unwrap()];
        let artifact_ips = vec!["1.2.3.4".parse().unwrap()];
        assert!(is_wildcard_artifact(&artifact_ips, Some(&wildcard)));

        let distinguishing_ips: Vec<IpAddr> = vec!["5.6.7.8".parse().unwrap()];
        assert!(!is_wildcard_artifact(&distinguishing_ips, Some(&wildcard)));
    }

    #[test]
    fn default_wordlist_is_used_when_no_path_given() {
        let words = load_wordlist(None);
        assert!(words.contains(&"www".to_string()));
    }
}
