//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Largest accepted `moderation.max_delay_secs` (one year).
pub const MAX_DELAY_CEILING_SECS: u64 = 365 * 24 * 60 * 60;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("bot.owner_id is required (or set MODGUARD_OWNER_ID)")]
    MissingOwner,
    #[error("moderation.default_delay_secs ({default}) exceeds moderation.max_delay_secs ({max})")]
    DefaultDelayExceedsMax { default: u64, max: u64 },
    #[error("moderation.max_delay_secs ({0}) exceeds the ceiling of {max}s", max = MAX_DELAY_CEILING_SECS)]
    MaxDelayTooLarge(u64),
    #[error("moderation.cache_capacity must be non-zero when caching is enabled")]
    CacheCapacityZero,
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bot.owner_id.is_none() {
        errors.push(ValidationError::MissingOwner);
    }

    let moderation = &config.moderation;
    if moderation.default_delay_secs > moderation.max_delay_secs {
        errors.push(ValidationError::DefaultDelayExceedsMax {
            default: moderation.default_delay_secs,
            max: moderation.max_delay_secs,
        });
    }
    if moderation.max_delay_secs > MAX_DELAY_CEILING_SECS {
        errors.push(ValidationError::MaxDelayTooLarge(moderation.max_delay_secs));
    }
    if moderation.cache_exemptions && moderation.cache_capacity == 0 {
        errors.push(ValidationError::CacheCapacityZero);
    }

    let db_path = &config.database.path;
    if db_path != ":memory:"
        && let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(db_path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
