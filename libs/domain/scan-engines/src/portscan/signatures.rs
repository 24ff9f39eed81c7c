// [libs/domain/scan-engines/src/portscan/signatures.rs]

//! Well-known-port lookup plus signature probes for recognized service
//! families: an HTTP `HEAD` probe and a TLS ClientHello probe built
//! directly on `rustls` (§4.3).

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use rustls::{ClientConfig, ClientConnection, RootCertStore, ServerName};
use std::collections::HashMap;
use std::convert::TryFrom;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

static WELL_KNOWN_PORTS: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (21, "ftp"),
        (22, "ssh"),
        (23, "telnet"),
        (25, "smtp"),
        (53, "dns"),
        (80, "http"),
        (110, "pop3"),
        (111, "rpcbind"),
        (135, "msrpc"),
        (139, "netbios-ssn"),
        (143, "imap"),
        (443, "https"),
        (445, "microsoft-ds"),
        (465, "smtps"),
        (587, "submission"),
        (993, "imaps"),
        (995, "pop3s"),
        (1433, "mssql"),
        (1521, "oracle"),
        (2049, "nfs"),
        (3000, "http-alt"),
        (3306, "mysql"),
        (3389, "rdp"),
        (5432, "postgresql"),
        (5900, "vnc"),
        (6379, "redis"),
        (8000, "http-alt"),
        (8080, "http-proxy"),
        (8443, "https-alt"),
        (9200, "elasticsearch"),
        (27017, "mongodb"),
    ])
});

/// Looks up a service name for a commonly assigned port.
pub fn well_known_service(port: u16) -> Option<&'static str> {
    WELL_KNOWN_PORTS.get(&port).copied()
}

const HTTP_FAMILY: &[u16] = &[80, 8000, 8080, 3000, 8888];
const TLS_FAMILY: &[u16] = &[443, 8443, 465, 993, 995, 636];

/// Runs a signature probe appropriate for `port`'s recognized family,
/// returning `(service, version)` when the probe confirms the family.
pub async fn probe_signature(stream: &mut TcpStream, port: u16) -> Option<(String, String)> {
    if TLS_FAMILY.contains(&port) {
        return probe_tls(stream).await;
    }
    if HTTP_FAMILY.contains(&port) {
        return probe_http(stream).await;
    }
    None
}

async fn probe_http(stream: &mut TcpStream) -> Option<(String, String)> {
    let request = b"HEAD / HTTP/1.0\r\nConnection: close\r\n\r\n";
    tokio::time::timeout(Duration::from_millis(800), stream.write_all(request)).await.ok()?.ok()?;

    let mut buf = vec![0u8; 2048];
    let n = tokio::time::timeout(Duration::from_millis(800), stream.read(&mut buf)).await.ok()?.ok()?;
    let response = String::from_utf8_lossy(&buf[..n]);
    if !response.starts_with("HTTP/") {
        return None;
    }
    let version = response.lines().next().unwrap_or_default().split_whitespace().next().unwrap_or("HTTP/1.0");
    let server = response
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("server:"))
        .map(|l| l.splitn(2, ':').nth(1).unwrap_or_default().trim().to_string())
        .unwrap_or_else(|| "http".to_string());
    Some((server, version.to_string()))
}

/// Drives a raw ClientHello/ServerHello exchange to confirm the peer
/// speaks TLS and to read back the negotiated protocol version.
async fn probe_tls(stream: &mut TcpStream) -> Option<(String, String)> {
    let mut roots = RootCertStore::empty();
    roots.add_server_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(ta.subject, ta.spki, ta.name_constraints)
    }));
    let config = Arc::new(
        ClientConfig::builder().with_safe_defaults().with_root_certificates(roots).with_no_client_auth(),
    );
    let name = ServerName::try_from("probe.local").ok()?;
    let mut conn = ClientConnection::new(config, name).ok()?;

    let mut outgoing = Vec::new();
    conn.write_tls(&mut outgoing).ok()?;
    tokio::time::timeout(Duration::from_millis(800), stream.write_all(&outgoing)).await.ok()?.ok()?;

    let mut incoming = [0u8; 4096];
    let n = tokio::time::timeout(Duration::from_millis(800), stream.read(&mut incoming)).await.ok()?.ok()?;
    if n == 0 {
        return None;
    }
    let mut cursor = std::io::Cursor::new(&incoming[..n]);
    if conn.read_tls(&mut cursor).is_err() {
        return None;
    }
    if conn.process_new_packets().is_err() {
        // The handshake itself need not complete for the probe to confirm
        // TLS is present; an alert or partial ServerHello still proves it.
        return Some(("tls".to_string(), "unknown".to_string()));
    }

    let version = conn.protocol_version().map(describe_version).unwrap_or("unknown");
    Some(("tls".to_string(), version.to_string()))
}

fn describe_version(v: rustls::ProtocolVersion) -> &'static str {
    match v {
        rustls::ProtocolVersion::TLSv1_3 => "TLSv1.3",
        rustls::ProtocolVersion::TLSv1_2 => "TLSv1.2",
        rustls::ProtocolVersion::TLSv1_1 => "TLSv1.1",
        rustls::ProtocolVersion::TLSv1_0 => "TLSv1.0",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_ports_resolve_common_services() {
        assert_eq!(well_known_service(443), Some("https"));
        assert_eq!(well_known_service(22), Some("ssh"));
        assert_eq!(well_known_service(60000), None);
    }
}
