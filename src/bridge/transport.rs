//! [`Transport`] implementation backed by the bridge.
//!
//! Removals and notices become outbound frames. The administrator oracle is
//! answered from rosters the adapter pushes with `admins` frames; a space
//! whose roster was never pushed cannot be answered and reports
//! [`TransportError::Unavailable`].

use super::frames::Outbound;
use crate::ids::{Identity, MessageId, SpaceId};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::debug;

pub struct BridgeTransport {
    outbound: mpsc::Sender<Outbound>,
    rosters: DashMap<SpaceId, HashSet<Identity>>,
}

impl BridgeTransport {
    pub fn new(outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            outbound,
            rosters: DashMap::new(),
        }
    }

    /// Replace the administrator roster of `space`.
    pub fn update_roster(&self, space: SpaceId, admins: Vec<Identity>) {
        debug!(%space, count = admins.len(), "Roster updated");
        self.rosters.insert(space, admins.into_iter().collect());
    }

    pub fn forget_space(&self, space: SpaceId) {
        self.rosters.remove(&space);
    }

    /// Queue a frame for the writer. Fails only once the writer has stopped.
    pub async fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn is_administrator(
        &self,
        space: SpaceId,
        identity: Identity,
    ) -> Result<bool, TransportError> {
        self.rosters
            .get(&space)
            .map(|roster| roster.contains(&identity))
            .ok_or_else(|| TransportError::Unavailable(format!("no roster for space {space}")))
    }

    /// Success means the request was handed to the adapter, not that the
    /// platform has deleted the message.
    async fn remove_content(
        &self,
        space: SpaceId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        self.send(Outbound::Remove { space, message }).await
    }

    async fn notify(&self, space: SpaceId, text: &str) -> Result<(), TransportError> {
        self.send(Outbound::Notify {
            space,
            text: text.to_string(),
        })
        .await
    }
}
