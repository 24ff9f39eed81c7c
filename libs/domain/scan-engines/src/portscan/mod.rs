// [libs/domain/scan-engines/src/portscan/mod.rs]

//! Port scanning (§4.3): `tcp_connect`/`udp` probing bounded by a
//! semaphore + rate limiter pair, well-known-port service detection, and
//! signature probes for recognized families. Grounded on the same
//! concurrency shape as [`crate::subdomain`], results streamed out of
//! completion order via an `mpsc` channel fed by a `JoinSet`.

mod ports;
mod signatures;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::{Quota, RateLimiter};
use serde::Serialize;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use scancore_domain_models::task::{PortScanConfig, PortScanMethod};

use crate::errors::EngineError;
use crate::shared::{EngineOutcome, ProgressThrottle, ResultSink, RunTimer};

pub use ports::parse_ports;
pub use signatures::well_known_service;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortResult {
    pub host: String,
    pub ip: String,
    pub port: u16,
    pub protocol: &'static str,
    pub status: PortStatus,
    pub service: Option<String>,
    pub version: Option<String>,
    pub banner: Option<String>,
    pub response_time_ms: u64,
    pub timestamp: chrono::DateTime<Utc>,
}

const BANNER_BYTES: usize = 256;

pub struct PortScanEngine;

impl PortScanEngine {
    /// Scans every `(target, port)` pair named by `config`, emitting a
    /// [`PortResult`] to `sink` as each completes.
    #[instrument(skip(config, sink, cancel))]
    pub async fn run(
        config: &PortScanConfig,
        sink: &dyn ResultSink<PortResult>,
        cancel: CancellationToken,
    ) -> Result<EngineOutcome, EngineError> {
        let ports = parse_ports(&config.ports)?;
        let timer = RunTimer::start();
        let progress = ProgressThrottle::default();

        let pairs: Vec<(String, u16)> =
            config.targets.iter().flat_map(|t| ports.iter().map(move |p| (t.clone(), *p))).collect();
        let total = pairs.len().max(1) as f64;

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1) as usize));
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            std::num::NonZeroU32::new(config.rate_limit.max(1)).expect("rate_limit clamped to at least 1"),
        )));
        let exclude: std::collections::HashSet<u16> = config.exclude_ports.iter().copied().collect();

        let mut set = tokio::task::JoinSet::new();
        for (target, port) in pairs {
            if exclude.contains(&port) {
                continue;
            }
            let semaphore = Arc::clone(&semaphore);
            let limiter = Arc::clone(&limiter);
            let cancel_child = cancel.clone();
            let method = config.scan_method;
            let timeout = Duration::from_secs(config.timeout_secs.max(1));
            let banner_grab = config.enable_banner;
            let service_detection = config.enable_service;

            set.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    _ = cancel_child.cancelled() => None,
                }?;
                limiter.until_ready().await;
                Some(probe_one(target, port, method, timeout, banner_grab, service_detection).await)
            });
        }

        let mut completed = 0u64;
        while let Some(joined) = set.join_next().await {
            completed += 1;
            if progress.should_emit(completed as f64 / total) {
                debug!(progress = completed as f64 / total, "port scan progress");
            }
            if let Ok(Some(result)) = joined {
                timer.record_unit();
                sink.emit(result);
            }
        }

        Ok(timer.finish(&cancel, false))
    }
}

async fn probe_one(
    target: String,
    port: u16,
    method: PortScanMethod,
    timeout: Duration,
    banner_grab: bool,
    service_detection: bool,
) -> PortResult {
    let started = std::time::Instant::now();
    let (status, ip, mut stream) = match method {
        PortScanMethod::TcpConnect | PortScanMethod::TcpSyn => tcp_probe(&target, port, timeout).await,
        PortScanMethod::Udp => udp_probe(&target, port, timeout).await,
    };

    let mut banner = None;
    let mut service = None;
    let mut version = None;

    if status == PortStatus::Open {
        if service_detection {
            let detected = well_known_service(port);
            service = detected.map(str::to_string);
            if let Some(stream) = stream.as_mut() {
                if let Some((svc, ver)) = signatures::probe_signature(stream, port).await {
                    service = Some(svc);
                    version = Some(ver);
                }
            }
        }
        if banner_grab {
            if let Some(stream) = stream.as_mut() {
                banner = read_banner(stream).await;
            }
        }
    }

    PortResult {
        host: target,
        ip,
        port,
        protocol: if method == PortScanMethod::Udp { "udp" } else { "tcp" },
        status,
        service,
        version,
        banner,
        response_time_ms: started.elapsed().as_millis() as u64,
        timestamp: Utc::now(),
    }
}

async fn tcp_probe(target: &str, port: u16, timeout: Duration) -> (PortStatus, String, Option<TcpStream>) {
    match tokio::time::timeout(timeout, TcpStream::connect((target, port))).await {
        Ok(Ok(stream)) => {
            let ip = stream.peer_addr().map(|a| a.ip().to_string()).unwrap_or_else(|_| target.to_string());
            (PortStatus::Open, ip, Some(stream))
        }
        Ok(Err(e)) if is_connection_refused(&e) => (PortStatus::Closed, target.to_string(), None),
        _ => (PortStatus::Filtered, target.to_string(), None),
    }
}

fn is_connection_refused(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::ConnectionRefused
}

async fn udp_probe(target: &str, port: u16, timeout: Duration) -> (PortStatus, String, Option<TcpStream>) {
    let status = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => {
            if socket.connect((target, port)).await.is_err() {
                return (PortStatus::Filtered, target.to_string(), None);
            }
            let _ = socket.send(&[]).await;
            let mut buf = [0u8; 1];
            let recv = tokio::time::timeout(timeout, socket.recv(&mut buf)).await;
            classify_udp_reply(recv.ok())
        }
        Err(_) => PortStatus::Filtered,
    };
    (status, target.to_string(), None)
}

/// Classifies a UDP probe's `recv` outcome (§4.3). A reply means the port
/// answered and is `Open`. A delayed ICMP port-unreachable surfaces on a
/// connected UDP socket as `ConnectionRefused` from `recv`, not as a
/// distinct error up front, and means `Closed`. Anything else — no reply
/// within the timeout, or another I/O error — is reported `Filtered`
/// conservatively, since UDP gives no way to tell "dropped by a firewall"
/// from "dropped on the floor".
fn classify_udp_reply(recv: Option<std::io::Result<usize>>) -> PortStatus {
    match recv {
        Some(Ok(_)) => PortStatus::Open,
        Some(Err(e)) if is_connection_refused(&e) => PortStatus::Closed,
        _ => PortStatus::Filtered,
    }
}

async fn read_banner(stream: &mut TcpStream) -> Option<String> {
    use tokio::io::AsyncReadExt;
    let mut buf = vec![0u8; BANNER_BYTES];
    let n = tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await.ok()?.ok()?;
    if n == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&buf[..n]).trim().to_string())
}

fn target_ip(target: &str) -> Option<IpAddr> {
    target.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ip_parses_literal_addresses() {
        assert!(target_ip("1.2.3.4").is_some());
        assert!(target_ip("not-an-ip").is_none());
    }

    #[test]
    fn udp_reply_is_open() {
        assert_eq!(classify_udp_reply(Some(Ok(1))), PortStatus::Open);
    }

    #[test]
    fn udp_connection_refused_is_closed() {
        let err = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_udp_reply(Some(Err(err))), PortStatus::Closed);
    }

    #[test]
    fn udp_timeout_is_filtered() {
        assert_eq!(classify_udp_reply(None), PortStatus::Filtered);
    }

    #[test]
    fn udp_other_io_error_is_filtered() {
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(classify_udp_reply(Some(Err(err))), PortStatus::Filtered);
    }
}
