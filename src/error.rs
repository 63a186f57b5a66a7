//! Errors surfaced to the administrative command layer.
//!
//! Event handling never fails from the caller's point of view (lookup and
//! removal failures are absorbed and counted), so the only error type the
//! outside world sees is [`CommandError`].

use crate::db::DbError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors returned by administrative operations.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The invoker lacks the rank the scope requires.
    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid delay: {seconds}s (allowed 0..={max}s)")]
    InvalidDelay { seconds: i64, max: u64 },

    /// The durable write failed; nothing in memory was changed.
    #[error("store write failed: {0}")]
    Store(#[from] DbError),

    /// Rank could not be verified. Authorization fails closed.
    #[error("administrator lookup failed: {0}")]
    Oracle(#[from] TransportError),
}

impl CommandError {
    /// Get a static error code string for metrics labeling and bridge replies.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::InvalidDelay { .. } => "invalid_delay",
            Self::Store(_) => "store_failure",
            Self::Oracle(_) => "oracle_failure",
        }
    }
}

/// Result type for administrative operations.
pub type CommandResult<T> = Result<T, CommandError>;
