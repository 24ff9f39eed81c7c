// [libs/domain/scan-engines/src/monitor/fetch.rs]

//! Page fetching (§4.4): an HTTP GET carrying one of three
//! authentication modes, with an MD5 content hash taken over the raw
//! response body before any preprocessing.

use md5::{Digest, Md5};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::EngineError;

#[derive(Debug, Clone)]
pub enum AuthMode {
    None,
    Basic { username: String, password: String },
    Cookie { cookie: String },
}

impl AuthMode {
    pub fn from_config(value: Option<&serde_json::Value>) -> Self {
        let Some(value) = value else { return AuthMode::None };
        match value.get("type").and_then(|v| v.as_str()) {
            Some("basic") => AuthMode::Basic {
                username: value.get("username").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                password: value.get("password").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            },
            Some("cookie") => {
                AuthMode::Cookie { cookie: value.get("cookie").and_then(|v| v.as_str()).unwrap_or_default().to_string() }
            }
            _ => AuthMode::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub body: String,
    pub content_hash: String,
    pub status: u16,
}

/// Fetches `url`, applying `auth` and `headers`, bounded by `timeout`.
pub async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    auth: &AuthMode,
    headers: &HashMap<String, String>,
    timeout: Duration,
) -> Result<FetchResult, EngineError> {
    let mut request = client.get(url).timeout(timeout);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    request = match auth {
        AuthMode::None => request,
        AuthMode::Basic { username, password } => request.basic_auth(username, Some(password)),
        AuthMode::Cookie { cookie } => request.header(reqwest::header::COOKIE, cookie),
    };

    let response = request.send().await.map_err(|e| EngineError::Network(e.to_string()))?;
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| EngineError::Network(e.to_string()))?;
    let content_hash = hash_content(&body);

    Ok(FetchResult { body, content_hash, status })
}

pub fn hash_content(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_mode_defaults_to_none() {
        assert!(matches!(AuthMode::from_config(None), AuthMode::None));
    }

    #[test]
    fn auth_mode_parses_basic() {
        let value = serde_json::json!({"type": "basic", "username": "u", "password": "p"});
        match AuthMode::from_config(Some(&value)) {
            AuthMode::Basic { username, password } => {
                assert_eq!(username, "u");
                assert_eq!(password, "p");
            }
            _ => panic!("expected basic auth"),
        }
    }

    #[test]
    fn auth_mode_parses_cookie() {
        let value = serde_json::json!({"type": "cookie", "cookie": "session=abc"});
        match AuthMode::from_config(Some(&value)) {
            AuthMode::Cookie { cookie } => assert_eq!(cookie, "session=abc"),
            _ => panic!("expected cookie auth"),
        }
    }

    #[test]
    fn hash_is_stable_for_identical_content() {
        assert_eq!(hash_content("same content"), hash_content("same content"));
        assert_ne!(hash_content("a"), hash_content("b"));
    }
}
