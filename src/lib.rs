//! modguard - exemption-aware moderation engine.
//!
//! Removes edited messages and, after a per-space grace window, media posted
//! by members who are not exempt. Exemptions are granted per space or
//! globally and are re-checked when a deferred removal comes due.

pub mod bridge;
pub mod config;
pub mod db;
pub mod delay;
pub mod engine;
pub mod error;
pub mod http;
pub mod ids;
pub mod metrics;
pub mod policy;
pub mod router;
pub mod scheduler;
pub mod services;
pub mod transport;

#[cfg(test)]
mod testing;

pub use engine::{Engine, EngineParams};
pub use ids::{Identity, MessageId, Scope, SpaceId};
