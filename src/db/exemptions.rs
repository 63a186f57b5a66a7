//! Exemption repository.
//!
//! One row per `(scope, identity)`; the UNIQUE constraint is what makes
//! grants idempotent.

use super::DbError;
use crate::ids::{Identity, Scope};
use sqlx::SqlitePool;

/// A stored exemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExemptionRecord {
    pub scope: Scope,
    pub identity: Identity,
    pub granted_by: Identity,
    pub granted_at: i64,
}

/// Repository for exemption records.
pub struct ExemptionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ExemptionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an exemption. An existing record is left as-is.
    pub async fn grant(
        &self,
        scope: Scope,
        identity: Identity,
        granted_by: Identity,
    ) -> Result<(), DbError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO exemptions (scope, identity, granted_by, granted_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (scope, identity) DO NOTHING
            "#,
        )
        .bind(scope.storage_key())
        .bind(identity.0)
        .bind(granted_by.0)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete an exemption. Returns whether a record existed.
    pub async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM exemptions
            WHERE scope = ? AND identity = ?
            "#,
        )
        .bind(scope.storage_key())
        .bind(identity.0)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        let found: i64 = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM exemptions WHERE scope = ? AND identity = ?
            )
            "#,
        )
        .bind(scope.storage_key())
        .bind(identity.0)
        .fetch_one(self.pool)
        .await?;

        Ok(found != 0)
    }

    /// List exemptions in a scope in insertion order.
    pub async fn list(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError> {
        let rows = sqlx::query_as::<_, (String, i64, i64, i64)>(
            r#"
            SELECT scope, identity, granted_by, granted_at
            FROM exemptions
            WHERE scope = ?
            ORDER BY id ASC
            "#,
        )
        .bind(scope.storage_key())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|(scope_key, identity, granted_by, granted_at)| {
                let scope = Scope::from_storage_key(&scope_key)
                    .ok_or_else(|| DbError::InvalidScope(scope_key.clone()))?;
                Ok(ExemptionRecord {
                    scope,
                    identity: Identity(identity),
                    granted_by: Identity(granted_by),
                    granted_at,
                })
            })
            .collect()
    }
}
