// [apps/orchestrator/src/middleware.rs]

//! Bearer-token auth guard (§4.7): a worker node authenticates with the
//! shared node token, an operator authenticates with a session token
//! issued by `POST /auth/login`.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kernel::AppState;

/// Identity injected into the request's extensions by [`auth_guard`],
/// consumed by handlers that need to know who is calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub subject: String,
    pub is_worker_node: bool,
    pub roles: Vec<String>,
}

pub async fn auth_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if token == state.worker_auth_token.as_str() {
        debug!("worker node authenticated");
        req.extensions_mut().insert(CallerIdentity {
            subject: "worker".to_string(),
            is_worker_node: true,
            roles: vec!["worker".to_string()],
        });
        return Ok(next.run(req).await);
    }

    match state.session_store.validate(token, Utc::now(), session_ttl(), refresh_threshold()) {
        Ok(_) => {
            let session = state.session_store.get(token).ok_or(StatusCode::UNAUTHORIZED)?;
            req.extensions_mut().insert(CallerIdentity {
                subject: session.user_id.to_string(),
                is_worker_node: false,
                roles: session.roles,
            });
            Ok(next.run(req).await)
        }
        Err(_) => {
            warn!("rejected request with invalid or expired token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

pub fn session_ttl() -> chrono::Duration {
    chrono::Duration::hours(8)
}

pub fn refresh_threshold() -> chrono::Duration {
    chrono::Duration::hours(1)
}
