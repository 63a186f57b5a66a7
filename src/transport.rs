//! Platform transport abstraction.
//!
//! The engine never talks to the chat platform directly. Everything it needs
//! from the outside world (the administrator oracle, content removal and
//! best-effort notices) goes through [`Transport`].

use crate::ids::{Identity, MessageId, SpaceId};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform could not answer (network error, unknown roster, ...).
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    /// The platform answered but refused the operation.
    #[error("platform rejected request: {0}")]
    Rejected(String),
    /// The outbound side of the bridge has shut down.
    #[error("transport closed")]
    Closed,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether `identity` holds administrative rank in `space`.
    async fn is_administrator(
        &self,
        space: SpaceId,
        identity: Identity,
    ) -> Result<bool, TransportError>;

    /// Delete a message.
    async fn remove_content(&self, space: SpaceId, message: MessageId)
    -> Result<(), TransportError>;

    /// Post a text notice into a space.
    async fn notify(&self, space: SpaceId, text: &str) -> Result<(), TransportError>;
}
