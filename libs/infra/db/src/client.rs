// [libs/infra/db/src/client.rs]

//! Connection wrapper around the libsql driver, shared by every repository.

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{error, info, instrument};

use crate::errors::DbError;
use crate::schema::apply_schema;

/// A handle to the scan core's libsql database, local file or remote Turso.
///
/// Cloning is cheap: the underlying [`Database`] is reference-counted, and
/// every repository opens its own [`Connection`] from it.
#[derive(Clone)]
pub struct DbClient {
    database: Arc<Database>,
    /// Keeps an in-memory database alive for the process lifetime; dropping
    /// the last connection to a `:memory:` database discards its schema.
    _memory_anchor: Option<Arc<Connection>>,
}

impl DbClient {
    /// Opens a connection to `url` and applies the schema migrations.
    ///
    /// `url` starting with `libsql://` or `https://` is treated as a remote
    /// Turso database and requires `auth_token`. Anything else — a file path
    /// or `:memory:` — opens a local embedded database.
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::ConfigurationError("database url is empty".into()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:") || url.contains("mode=memory");

        info!(url, is_remote, "connecting to database");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| DbError::ConfigurationError("remote database requires an auth token".into()))?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let database = Arc::new(database);

        let memory_anchor = if is_memory {
            let anchor = database.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&anchor).await.map_err(|e| DbError::ConnectionError(e.to_string()))?;
            Some(Arc::new(anchor))
        } else {
            let bootstrap = database.connect().map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&bootstrap).await.map_err(|e| DbError::ConnectionError(e.to_string()))?;
            None
        };

        Ok(Self { database, _memory_anchor: memory_anchor })
    }

    /// Opens a new connection against the underlying database.
    pub fn connection(&self) -> Result<Connection, DbError> {
        self.database.connect().map_err(|e| {
            error!(error = %e, "failed to allocate connection");
            DbError::ConnectionError(e.to_string())
        })
    }
}
