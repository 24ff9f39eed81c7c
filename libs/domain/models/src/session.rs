use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ErrorKind;

/// Authenticated credential binding with explicit expiry (§3.1, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub valid: bool,
    pub refreshed: bool,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
}

impl From<&SessionError> for ErrorKind {
    fn from(e: &SessionError) -> Self {
        match e {
            SessionError::NotFound | SessionError::Expired => ErrorKind::Unauthorized,
        }
    }
}

impl Session {
    pub fn new(user_id: Uuid, roles: Vec<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        let token = Uuid::new_v4().to_string();
        Self { token, user_id, roles, created_at: now, last_used: now, expires_at: now + ttl }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// A session whose remaining lifetime is under `refresh_threshold`
    /// auto-extends on access (§3.3, §4.7). Mutates `expires_at`/`last_used`
    /// atomically with the validity check, returning whether a refresh
    /// happened.
    pub fn validate_and_refresh(
        &mut self,
        now: DateTime<Utc>,
        ttl: Duration,
        refresh_threshold: Duration,
    ) -> Result<SessionStatus, SessionError> {
        if self.is_expired(now) {
            return Err(SessionError::Expired);
        }
        let mut refreshed = false;
        if self.expires_at - now < refresh_threshold {
            self.expires_at = now + ttl;
            refreshed = true;
        }
        self.last_used = now;
        Ok(SessionStatus { valid: true, refreshed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_session_is_always_invalid() {
        let mut s = Session::new(Uuid::new_v4(), vec!["user".into()], Duration::hours(8));
        s.expires_at = Utc::now() - Duration::seconds(1);
        let err = s.validate_and_refresh(Utc::now(), Duration::hours(8), Duration::hours(1));
        assert!(matches!(err, Err(SessionError::Expired)));
    }

    #[test]
    fn refreshes_only_within_threshold() {
        let mut s = Session::new(Uuid::new_v4(), vec!["user".into()], Duration::hours(8));
        let now = Utc::now();
        let status = s.validate_and_refresh(now, Duration::hours(8), Duration::hours(1)).unwrap();
        assert!(!status.refreshed);

        s.expires_at = now + Duration::minutes(30);
        let status = s.validate_and_refresh(now, Duration::hours(8), Duration::hours(1)).unwrap();
        assert!(status.refreshed);
        assert!(s.expires_at > now + Duration::hours(7));
    }
}
