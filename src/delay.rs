//! Per-space grace window lookup.

use crate::db::DelayStore;
use crate::error::{CommandError, CommandResult};
use crate::ids::{Identity, SpaceId};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct DelayConfig {
    store: Arc<dyn DelayStore>,
    default_secs: u64,
    max_secs: u64,
}

impl DelayConfig {
    pub fn new(store: Arc<dyn DelayStore>, default_secs: u64, max_secs: u64) -> Self {
        Self {
            store,
            default_secs,
            max_secs,
        }
    }

    pub fn default_secs(&self) -> u64 {
        self.default_secs
    }

    /// Grace window for `space` in seconds.
    ///
    /// A store failure falls back to the default rather than dropping the event.
    pub async fn get(&self, space: SpaceId) -> u64 {
        match self.store.get_delay(space).await {
            Ok(Some(secs)) => secs,
            Ok(None) => self.default_secs,
            Err(e) => {
                warn!(%space, error = %e, "Delay lookup failed, using default");
                self.default_secs
            }
        }
    }

    pub async fn get_duration(&self, space: SpaceId) -> Duration {
        Duration::from_secs(self.get(space).await)
    }

    /// Validate and persist an override. Authorization is the caller's job.
    pub async fn set(&self, space: SpaceId, seconds: i64, set_by: Identity) -> CommandResult<u64> {
        let secs = u64::try_from(seconds)
            .ok()
            .filter(|s| *s <= self.max_secs)
            .ok_or(CommandError::InvalidDelay {
                seconds,
                max: self.max_secs,
            })?;

        self.store.set_delay(space, secs, set_by).await?;
        Ok(secs)
    }

    /// Return `space` to the default grace window.
    pub async fn reset(&self, space: SpaceId) -> CommandResult<bool> {
        Ok(self.store.clear_delay(space).await?)
    }
}
