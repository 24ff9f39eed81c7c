// [libs/domain/store/src/sessions.rs]

//! In-memory session authority (§4.7), grounded on `swarm_telemetry.rs`'s
//! `RwLock<HashMap<...>>` shape. A secondary `user_id -> token` index
//! realizes the single-session-per-user policy without literal
//! Redis-style `session:<token>` keys, since Redis itself is out of scope.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;
use uuid::Uuid;

use scancore_domain_models::session::{Session, SessionError, SessionStatus};

pub struct SessionStore {
    by_token: RwLock<HashMap<String, Session>>,
    by_user: RwLock<HashMap<Uuid, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { by_token: RwLock::new(HashMap::new()), by_user: RwLock::new(HashMap::new()) }
    }

    /// Creates a session, evicting any prior session for `user_id` (single
    /// session per user, §4.7).
    #[instrument(skip(self, roles))]
    pub fn create(&self, user_id: Uuid, roles: Vec<String>, ttl: Duration) -> Session {
        let session = Session::new(user_id, roles, ttl);

        let mut by_user = self.by_user.write().expect("session store lock poisoned");
        let mut by_token = self.by_token.write().expect("session store lock poisoned");
        if let Some(old_token) = by_user.insert(user_id, session.token.clone()) {
            by_token.remove(&old_token);
        }
        by_token.insert(session.token.clone(), session.clone());
        session
    }

    /// Validates `token`, auto-refreshing it under one write-lock
    /// acquisition if it is due for renewal (§4.7, §3.8.5).
    #[instrument(skip(self))]
    pub fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
        ttl: Duration,
        refresh_threshold: Duration,
    ) -> Result<SessionStatus, SessionError> {
        let mut guard = self.by_token.write().expect("session store lock poisoned");
        let session = guard.get_mut(token).ok_or(SessionError::NotFound)?;
        session.validate_and_refresh(now, ttl, refresh_threshold)
    }

    pub fn revoke(&self, token: &str) {
        let mut by_token = self.by_token.write().expect("session store lock poisoned");
        if let Some(session) = by_token.remove(token) {
            self.by_user.write().expect("session store lock poisoned").remove(&session.user_id);
        }
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.by_token.read().expect("session store lock poisoned").get(token).cloned()
    }

    /// Sweeps every expired session, returning how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut by_token = self.by_token.write().expect("session store lock poisoned");
        let mut by_user = self.by_user.write().expect("session store lock poisoned");
        let expired: Vec<(String, Uuid)> =
            by_token.iter().filter(|(_, s)| s.is_expired(now)).map(|(t, s)| (t.clone(), s.user_id)).collect();
        for (token, user_id) in &expired {
            by_token.remove(token);
            by_user.remove(user_id);
        }
        expired.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_for_same_user_evicts_the_old_one() {
        let store = SessionStore::new();
        let user_id = Uuid::new_v4();
        let first = store.create(user_id, vec!["user".into()], Duration::hours(8));
        let second = store.create(user_id, vec!["user".into()], Duration::hours(8));

        assert!(store.get(&first.token).is_none());
        assert!(store.get(&second.token).is_some());
    }

    #[test]
    fn purge_expired_removes_both_indexes() {
        let store = SessionStore::new();
        let user_id = Uuid::new_v4();
        let session = store.create(user_id, vec!["user".into()], Duration::seconds(-1));
        let removed = store.purge_expired(Utc::now());
        assert_eq!(removed, 1);
        assert!(store.get(&session.token).is_none());
    }
}
