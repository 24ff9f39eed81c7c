// [libs/infra/db/src/repositories/session/queries.rs]

//! SQL text for [`super::SessionRepository`].

pub const UPSERT_SESSION: &str = r#"
    INSERT INTO sessions (token, user_id, roles, created_at, last_used, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(token) DO UPDATE SET
        last_used = excluded.last_used,
        expires_at = excluded.expires_at
"#;

pub const SELECT_BY_TOKEN: &str = r#"
    SELECT token, user_id, roles, created_at, last_used, expires_at
    FROM sessions WHERE token = ?1
"#;

pub const DELETE_EXPIRED: &str = r#"DELETE FROM sessions WHERE expires_at < ?1"#;

pub const DELETE_SESSION: &str = r#"DELETE FROM sessions WHERE token = ?1"#;
