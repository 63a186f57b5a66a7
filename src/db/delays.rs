//! Delay repository: per-space grace window overrides.

use super::DbError;
use crate::ids::{Identity, SpaceId};
use sqlx::SqlitePool;

/// A stored grace window override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayRecord {
    pub space: SpaceId,
    pub delay_secs: u64,
    pub set_by: Identity,
    pub set_at: i64,
}

/// Repository for delay overrides.
pub struct DelayRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DelayRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the override for a space. Last write wins.
    pub async fn set(
        &self,
        space: SpaceId,
        delay_secs: u64,
        set_by: Identity,
    ) -> Result<(), DbError> {
        let stored = i64::try_from(delay_secs).map_err(|_| DbError::DelayOutOfRange(delay_secs))?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO space_delays (space_id, delay_secs, set_by, set_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (space_id) DO UPDATE SET
                delay_secs = excluded.delay_secs,
                set_by = excluded.set_by,
                set_at = excluded.set_at
            "#,
        )
        .bind(space.0)
        .bind(stored)
        .bind(set_by.0)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, space: SpaceId) -> Result<Option<DelayRecord>, DbError> {
        let row = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT delay_secs, set_by, set_at
            FROM space_delays
            WHERE space_id = ?
            "#,
        )
        .bind(space.0)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(delay_secs, set_by, set_at)| {
            let delay_secs = u64::try_from(delay_secs)
                .map_err(|_| DbError::Internal(format!("negative delay stored for {}", space)))?;
            Ok(DelayRecord {
                space,
                delay_secs,
                set_by: Identity(set_by),
                set_at,
            })
        })
        .transpose()
    }

    /// Remove the override. Returns whether one existed.
    pub async fn clear(&self, space: SpaceId) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM space_delays WHERE space_id = ?")
            .bind(space.0)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
