use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields common to every discovered entity regardless of variant (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetHeader {
    pub id: Uuid,
    pub project_id: String,
    pub root_domain: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_scan_time: DateTime<Utc>,
    pub task_name: Option<String>,
}

/// One discovered entity: a common [`AssetHeader`] plus a variant-specific
/// [`AssetKind`] payload (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    #[serde(flatten)]
    pub header: AssetHeader,
    #[serde(flatten)]
    pub kind: AssetKind,
}

/// Discriminated union over the documented asset variants. `Other` is the
/// catch-all the spec names (`app`, `miniapp`, `other`) without giving
/// distinguishing fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetKind {
    Domain(DomainAsset),
    Subdomain(SubdomainAsset),
    Ip(IpAsset),
    Port(PortAsset),
    Url(UrlAsset),
    Http(HttpAsset),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainAsset {
    pub domain: String,
    #[serde(default)]
    pub ips: Vec<String>,
    pub whois: Option<String>,
    #[serde(default)]
    pub icp_info: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainAsset {
    pub host: String,
    #[serde(default)]
    pub ips: Vec<String>,
    pub cname: Option<String>,
    pub dns_type: Option<String>,
    #[serde(default)]
    pub dns_values: Vec<String>,
    pub takeover_suspected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latlng: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAsset {
    pub ip: String,
    pub asn: Option<String>,
    pub isp: Option<String>,
    pub location: Option<GeoLocation>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAsset {
    pub ip: String,
    pub host: Option<String>,
    pub port: u16,
    pub protocol: String,
    pub service: Option<String>,
    pub version: Option<String>,
    pub banner: Option<String>,
    pub tls: bool,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favicon {
    pub mmh3: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlAsset {
    pub url: String,
    pub host: String,
    pub path: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub hash: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub favicon: Option<Favicon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAsset {
    pub host: String,
    pub ip: String,
    pub port: u16,
    pub url: String,
    pub title: Option<String>,
    pub status_code: u16,
    pub web_server: Option<String>,
    pub tls: bool,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub favicon: Option<Favicon>,
    pub jarm: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub cdn: HashMap<String, String>,
}

/// The collapsed identity a duplicate insert is merged against (§3.3,
/// §4.5 "Indexing & uniqueness"). One function per variant, kept in one
/// place instead of re-matched at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    Domain { project_id: String, domain: String },
    Subdomain { project_id: String, host: String },
    Ip { project_id: String, ip: String },
    Port { project_id: String, ip: String, port: u16, protocol: String },
    Url { project_id: String, url_hash: String },
    Http { project_id: String, host: String, port: u16 },
    Other { project_id: String, id: Uuid },
}

impl AssetKind {
    pub fn natural_key(&self, header: &AssetHeader) -> NaturalKey {
        let project_id = header.project_id.clone();
        match self {
            AssetKind::Domain(d) => NaturalKey::Domain { project_id, domain: d.domain.clone() },
            AssetKind::Subdomain(s) => NaturalKey::Subdomain { project_id, host: s.host.clone() },
            AssetKind::Ip(i) => NaturalKey::Ip { project_id, ip: i.ip.clone() },
            AssetKind::Port(p) => {
                NaturalKey::Port { project_id, ip: p.ip.clone(), port: p.port, protocol: p.protocol.clone() }
            }
            AssetKind::Url(u) => {
                let url_hash = u.hash.clone().unwrap_or_else(|| u.url.clone());
                NaturalKey::Url { project_id, url_hash }
            }
            AssetKind::Http(h) => NaturalKey::Http { project_id, host: h.host.clone(), port: h.port },
            AssetKind::Other(_) => NaturalKey::Other { project_id, id: header.id },
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            AssetKind::Domain(_) => "domain",
            AssetKind::Subdomain(_) => "subdomain",
            AssetKind::Ip(_) => "ip",
            AssetKind::Port(_) => "port",
            AssetKind::Url(_) => "url",
            AssetKind::Http(_) => "http",
            AssetKind::Other(_) => "other",
        }
    }
}

impl Asset {
    /// Merges `incoming` into `self` per §4.5: tags union, `last_scan_time`
    /// and `updated_at` take the later value, other fields are overwritten
    /// by the newer record.
    pub fn merge(&mut self, incoming: Asset) {
        self.header.tags.extend(incoming.header.tags);
        if incoming.header.last_scan_time > self.header.last_scan_time {
            self.header.last_scan_time = incoming.header.last_scan_time;
        }
        self.header.updated_at = self.header.updated_at.max(incoming.header.updated_at);
        self.kind = incoming.kind;
    }
}

/// Directed typed edge between two Assets (§3.1). Invariant: both endpoints
/// exist in the same project — enforced by the repository, not this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRelation {
    pub id: Uuid,
    pub project_id: String,
    pub src_asset_id: Uuid,
    pub dst_asset_id: Uuid,
    pub relation_type: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(project_id: &str) -> AssetHeader {
        let now = Utc::now();
        AssetHeader {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            root_domain: "example.com".into(),
            tags: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            last_scan_time: now,
            task_name: None,
        }
    }

    #[test]
    fn subdomain_natural_key_is_project_plus_host() {
        let h = header("proj-a");
        let kind = AssetKind::Subdomain(SubdomainAsset {
            host: "www.example.com".into(),
            ips: vec![],
            cname: None,
            dns_type: None,
            dns_values: vec![],
            takeover_suspected: false,
        });
        let key = kind.natural_key(&h);
        assert_eq!(
            key,
            NaturalKey::Subdomain { project_id: "proj-a".into(), host: "www.example.com".into() }
        );
    }

    #[test]
    fn merge_unions_tags_and_prefers_newer_scan_time() {
        let mut h1 = header("proj-a");
        h1.tags.insert("prod".into());
        let mut a = Asset { header: h1.clone(), kind: AssetKind::Ip(IpAsset {
            ip: "1.2.3.4".into(), asn: None, isp: None, location: None, fingerprint: None,
        }) };
        let mut h2 = h1.clone();
        h2.tags = BTreeSet::from(["staging".into()]);
        h2.last_scan_time = h1.last_scan_time + chrono::Duration::seconds(5);
        let b = Asset { header: h2, kind: AssetKind::Ip(IpAsset {
            ip: "1.2.3.4".into(), asn: Some("AS123".into()), isp: None, location: None, fingerprint: None,
        }) };
        let newer_scan = b.header.last_scan_time;
        a.merge(b);
        assert_eq!(a.header.tags, BTreeSet::from(["prod".to_string(), "staging".to_string()]));
        assert_eq!(a.header.last_scan_time, newer_scan);
    }
}
