//! Database module for persistent storage.
//!
//! Provides async SQLite database access using SQLx for:
//! - Exemption records (global and per-space)
//! - Per-space grace window overrides
//!
//! The engine only sees the [`ExemptionStore`] and [`DelayStore`] traits;
//! [`Database`] is the durable implementation of both.

mod delays;
mod exemptions;

pub use delays::{DelayRecord, DelayRepository};
pub use exemptions::{ExemptionRecord, ExemptionRepository};

use crate::ids::{Identity, Scope, SpaceId};
use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("migration error: {0}")]
    Migration(sqlx::migrate::MigrateError),
    #[error("stored scope is malformed: {0}")]
    InvalidScope(String),
    #[error("delay out of range: {0}s")]
    DelayOutOfRange(u64),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Durable `(scope, identity) -> exempt` mapping.
///
/// Absence of a record means "not exempt". Every mutation is committed
/// before the call returns.
#[async_trait]
pub trait ExemptionStore: Send + Sync {
    /// Mark `identity` exempt in `scope`. Repeating a grant keeps the first record.
    async fn grant(&self, scope: Scope, identity: Identity, granted_by: Identity)
    -> Result<(), DbError>;

    /// Remove the exemption. Returns whether a record existed.
    async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError>;

    async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError>;

    /// All exemptions in `scope`, oldest grant first.
    async fn list_exempt(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError>;
}

/// Durable per-space grace window overrides.
#[async_trait]
pub trait DelayStore: Send + Sync {
    async fn set_delay(&self, space: SpaceId, delay_secs: u64, set_by: Identity)
    -> Result<(), DbError>;

    /// Stored override, or `None` when the space uses the default.
    async fn get_delay(&self, space: SpaceId) -> Result<Option<u64>, DbError>;

    /// Drop the override. Returns whether one existed.
    async fn clear_delay(&self, space: SpaceId) -> Result<bool, DbError>;
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create a new database connection, running migrations if needed.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // `file::memory:` is shared process-wide and collides across parallel
            // tests, so every call gets its own named shared-cache database.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:modguard-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        Self::run_migrations(&pool).await?;

        // WAL lets the fire path read exemptions while an admin write is in flight
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        // Grants must survive a crash right after they are acknowledged
        sqlx::query("PRAGMA synchronous=FULL").execute(&pool).await?;

        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Sqlx(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Database integrity check failed: {}", integrity_result),
            ))));
        }

        info!("Database integrity check passed");

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run embedded migrations.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(DbError::Migration)?;

        info!("Database migrations checked/applied");
        Ok(())
    }

    /// Get exemption repository.
    pub fn exemptions(&self) -> ExemptionRepository<'_> {
        ExemptionRepository::new(&self.pool)
    }

    /// Get delay repository.
    pub fn delays(&self) -> DelayRepository<'_> {
        DelayRepository::new(&self.pool)
    }
}

#[async_trait]
impl ExemptionStore for Database {
    async fn grant(
        &self,
        scope: Scope,
        identity: Identity,
        granted_by: Identity,
    ) -> Result<(), DbError> {
        self.exemptions().grant(scope, identity, granted_by).await
    }

    async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        self.exemptions().revoke(scope, identity).await
    }

    async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        self.exemptions().is_exempt(scope, identity).await
    }

    async fn list_exempt(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError> {
        self.exemptions().list(scope).await
    }
}

#[async_trait]
impl DelayStore for Database {
    async fn set_delay(
        &self,
        space: SpaceId,
        delay_secs: u64,
        set_by: Identity,
    ) -> Result<(), DbError> {
        self.delays().set(space, delay_secs, set_by).await
    }

    async fn get_delay(&self, space: SpaceId) -> Result<Option<u64>, DbError> {
        Ok(self.delays().get(space).await?.map(|r| r.delay_secs))
    }

    async fn clear_delay(&self, space: SpaceId) -> Result<bool, DbError> {
        self.delays().clear(space).await
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err)
    }
}
