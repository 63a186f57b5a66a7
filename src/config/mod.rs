//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, BotConfig, DatabaseConfig)
//! - [`moderation`]: Grace window and cache tuning (ModerationConfig)
//! - [`validation`]: Startup checks returning every problem found

mod moderation;
mod types;
pub mod validation;

pub use moderation::ModerationConfig;
pub use types::{BotConfig, Config, ConfigError, DatabaseConfig, OWNER_ENV_VAR};
