//! Integration test common infrastructure.
//!
//! Provides a recording transport and an engine wired to a real SQLite store.

use async_trait::async_trait;
use modguard::config::ModerationConfig;
use modguard::db::{Database, DelayStore, ExemptionStore};
use modguard::transport::{Transport, TransportError};
use modguard::{Engine, EngineParams, Identity, MessageId, SpaceId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[allow(dead_code)]
pub const OWNER: Identity = Identity(1);
#[allow(dead_code)]
pub const ADMIN: Identity = Identity(2);
#[allow(dead_code)]
pub const U1: Identity = Identity(10);
#[allow(dead_code)]
pub const S1: SpaceId = SpaceId(-100);
#[allow(dead_code)]
pub const LOG: SpaceId = SpaceId(-999);

/// Transport that records removals and notices.
#[derive(Default)]
pub struct RecordingTransport {
    admins: Mutex<HashMap<SpaceId, HashSet<Identity>>>,
    removals: Mutex<Vec<(SpaceId, MessageId)>>,
    notices: Mutex<Vec<(SpaceId, String)>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn with_admins(space: SpaceId, admins: &[Identity]) -> Self {
        let transport = Self::default();
        transport
            .admins
            .lock()
            .insert(space, admins.iter().copied().collect());
        transport
    }

    pub fn removals(&self) -> Vec<(SpaceId, MessageId)> {
        self.removals.lock().clone()
    }

    pub fn notices(&self) -> Vec<(SpaceId, String)> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn is_administrator(
        &self,
        space: SpaceId,
        identity: Identity,
    ) -> Result<bool, TransportError> {
        Ok(self
            .admins
            .lock()
            .get(&space)
            .is_some_and(|set| set.contains(&identity)))
    }

    async fn remove_content(
        &self,
        space: SpaceId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        self.removals.lock().push((space, message));
        Ok(())
    }

    async fn notify(&self, space: SpaceId, text: &str) -> Result<(), TransportError> {
        self.notices.lock().push((space, text.to_string()));
        Ok(())
    }
}

/// Engine over `db` with S1 administered by [`ADMIN`].
#[allow(dead_code)]
pub fn engine(db: &Database) -> (Engine, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::with_admins(S1, &[ADMIN]));
    let db = Arc::new(db.clone());
    let engine = Engine::new(EngineParams {
        exemptions: Arc::clone(&db) as Arc<dyn ExemptionStore>,
        delays: db as Arc<dyn DelayStore>,
        transport: Arc::clone(&transport) as Arc<dyn Transport>,
        owner: OWNER,
        log_space: Some(LOG),
        moderation: &ModerationConfig::default(),
    });
    (engine, transport)
}
