//! Moderation tuning configuration.

use serde::Deserialize;

/// Grace window and exemption cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Grace window for spaces without an override, in seconds (default: 1800).
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: u64,
    /// Upper bound accepted by `set_delay`, in seconds (default: 7 days).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Keep a read-through cache of exemption lookups (default: true).
    #[serde(default = "default_true")]
    pub cache_exemptions: bool,
    /// Maximum cached (scope, identity) entries (default: 100000).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: default_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            cache_exemptions: default_true(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_delay_secs() -> u64 {
    1800
}

fn default_max_delay_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    100_000
}
