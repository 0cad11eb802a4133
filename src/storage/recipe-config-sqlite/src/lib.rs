//! # Recipe Config - SQLite Backend
//!
//! SQLite implementation of the config store with scope isolation.
//! Each execution context gets its own database file, so global, project
//! and user configuration never share a table.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use recipe_config::{validate_key, ConfigError, ConfigStore, DeleteResult, ExecutionContext};

/// File name of the database inside each scope directory.
pub const DB_FILE_NAME: &str = "config.db";

/// Directories holding the configuration of each scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Directory of the global scope.
    pub global: PathBuf,
    /// Directory of the project scope.
    pub project: PathBuf,
    /// Directory of the user scope.
    pub user: PathBuf,
}

impl ConfigPaths {
    /// Places every scope in its own subdirectory of `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            global: base.join("global"),
            project: base.join("project"),
            user: base.join("user"),
        }
    }

    /// Returns the directory of a scope.
    pub fn dir(&self, context: ExecutionContext) -> &Path {
        match context {
            ExecutionContext::Global => &self.global,
            ExecutionContext::Project => &self.project,
            ExecutionContext::User => &self.user,
        }
    }

    /// Returns the database file of a scope.
    pub fn db_path(&self, context: ExecutionContext) -> PathBuf {
        self.dir(context).join(DB_FILE_NAME)
    }
}

/// SQLite config store with one database per execution context.
///
/// Databases are opened lazily. Reads and deletes never create a scope's
/// database; the first write does.
pub struct SqliteConfigStore {
    paths: ConfigPaths,
    pools: [OnceCell<SqlitePool>; 3],
}

impl SqliteConfigStore {
    /// Creates a store over the given scope directories.
    pub fn new(paths: ConfigPaths) -> Self {
        Self {
            paths,
            pools: [OnceCell::new(), OnceCell::new(), OnceCell::new()],
        }
    }

    /// Returns the scope directories of this store.
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Returns the pool of a scope, opening it if allowed.
    ///
    /// With `create == false` a scope without a database file yields `None`.
    async fn pool(
        &self,
        context: ExecutionContext,
        create: bool,
    ) -> Result<Option<&SqlitePool>, ConfigError> {
        let cell = &self.pools[context.index()];
        if let Some(pool) = cell.get() {
            return Ok(Some(pool));
        }

        if !create && !self.paths.db_path(context).exists() {
            return Ok(None);
        }

        let pool = cell.get_or_try_init(|| self.open(context)).await?;
        Ok(Some(pool))
    }

    /// Opens or creates the database of a scope.
    async fn open(&self, context: ExecutionContext) -> Result<SqlitePool, ConfigError> {
        let dir = self.paths.dir(context);
        std::fs::create_dir_all(dir)
            .map_err(|e| ConfigError::Io(format!("failed to create directory: {e}")))?;

        let db_path = self.paths.db_path(context);
        debug!(context = %context, path = %db_path.display(), "Opening config database");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| ConfigError::ConnectionFailed(e.to_string()))?;

        Self::migrate(&pool).await?;

        info!(context = %context, "Config database ready");

        Ok(pool)
    }

    /// Runs database migrations.
    async fn migrate(pool: &SqlitePool) -> Result<(), ConfigError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                version    INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| ConfigError::ConnectionFailed(format!("migration failed: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config_history (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                key        TEXT NOT NULL,
                value      TEXT,
                version    INTEGER NOT NULL,
                operation  TEXT NOT NULL,
                timestamp  INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| ConfigError::ConnectionFailed(format!("migration failed: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_config_history_key ON config_history (key)")
            .execute(pool)
            .await
            .map_err(|e| ConfigError::ConnectionFailed(format!("migration failed: {e}")))?;

        Ok(())
    }

    /// Returns the current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn scope_exists(&self, context: ExecutionContext) -> Result<bool, ConfigError> {
        Ok(self.pools[context.index()].initialized() || self.paths.db_path(context).exists())
    }

    async fn get(
        &self,
        key: &str,
        context: ExecutionContext,
    ) -> Result<Option<Value>, ConfigError> {
        validate_key(key)?;

        let Some(pool) = self.pool(context, false).await? else {
            return Ok(None);
        };

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        row.map(|(raw,)| serde_json::from_str(&raw).map_err(ConfigError::from))
            .transpose()
    }

    async fn set(
        &self,
        key: &str,
        value: &Value,
        context: ExecutionContext,
    ) -> Result<(), ConfigError> {
        validate_key(key)?;

        let Some(pool) = self.pool(context, true).await? else {
            return Err(ConfigError::ConnectionFailed(format!(
                "no database for context {context}"
            )));
        };

        let raw = serde_json::to_string(value)?;
        let now = Self::now();

        let existing: Option<(i64,)> = sqlx::query_as("SELECT version FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        let (version, operation) = match existing {
            Some((v,)) => (v + 1, "update"),
            None => (1, "create"),
        };

        sqlx::query(
            r#"
            INSERT INTO config (key, value, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                version = excluded.version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&raw)
        .bind(version)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO config_history (key, value, version, operation, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(key)
        .bind(&raw)
        .bind(version)
        .bind(operation)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        debug!(context = %context, key = key, version = version, "Config value stored");
        Ok(())
    }

    async fn delete(
        &self,
        key: &str,
        context: ExecutionContext,
    ) -> Result<DeleteResult, ConfigError> {
        validate_key(key)?;

        let Some(pool) = self.pool(context, false).await? else {
            return Ok(DeleteResult::missing_scope(context, key));
        };

        let existing: Option<(String, i64)> =
            sqlx::query_as("SELECT value, version FROM config WHERE key = ?")
                .bind(key)
                .fetch_optional(pool)
                .await
                .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        let Some((raw, version)) = existing else {
            return Ok(DeleteResult {
                context,
                exists: true,
                deleted: false,
                key: key.to_string(),
                value: None,
            });
        };

        sqlx::query("DELETE FROM config WHERE key = ?")
            .bind(key)
            .execute(pool)
            .await
            .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        sqlx::query(
            "INSERT INTO config_history (key, value, version, operation, timestamp) VALUES (?, NULL, ?, 'delete', ?)",
        )
        .bind(key)
        .bind(version + 1)
        .bind(Self::now())
        .execute(pool)
        .await
        .map_err(|e| ConfigError::QueryFailed(e.to_string()))?;

        debug!(context = %context, key = key, "Config value deleted");

        Ok(DeleteResult {
            context,
            exists: true,
            deleted: true,
            key: key.to_string(),
            value: Some(serde_json::from_str(&raw)?),
        })
    }
}
