//! In-memory test doubles for the store traits and the transport.

use crate::db::{DbError, DelayStore, ExemptionRecord, ExemptionStore};
use crate::ids::{Identity, MessageId, Scope, SpaceId};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// Exemption and delay store backed by plain collections.
#[derive(Default)]
pub struct MemoryStore {
    exemptions: Mutex<Vec<ExemptionRecord>>,
    delays: Mutex<HashMap<SpaceId, u64>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), DbError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DbError::Internal("read failure injected".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Internal("write failure injected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExemptionStore for MemoryStore {
    async fn grant(
        &self,
        scope: Scope,
        identity: Identity,
        granted_by: Identity,
    ) -> Result<(), DbError> {
        self.check_write()?;
        let mut records = self.exemptions.lock();
        if !records.iter().any(|r| r.scope == scope && r.identity == identity) {
            records.push(ExemptionRecord {
                scope,
                identity,
                granted_by,
                granted_at: 0,
            });
        }
        Ok(())
    }

    async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        self.check_write()?;
        let mut records = self.exemptions.lock();
        let before = records.len();
        records.retain(|r| !(r.scope == scope && r.identity == identity));
        Ok(records.len() != before)
    }

    async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        self.check_read()?;
        Ok(self
            .exemptions
            .lock()
            .iter()
            .any(|r| r.scope == scope && r.identity == identity))
    }

    async fn list_exempt(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError> {
        self.check_read()?;
        Ok(self
            .exemptions
            .lock()
            .iter()
            .filter(|r| r.scope == scope)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DelayStore for MemoryStore {
    async fn set_delay(
        &self,
        space: SpaceId,
        delay_secs: u64,
        _set_by: Identity,
    ) -> Result<(), DbError> {
        self.check_write()?;
        self.delays.lock().insert(space, delay_secs);
        Ok(())
    }

    async fn get_delay(&self, space: SpaceId) -> Result<Option<u64>, DbError> {
        self.check_read()?;
        Ok(self.delays.lock().get(&space).copied())
    }

    async fn clear_delay(&self, space: SpaceId) -> Result<bool, DbError> {
        self.check_write()?;
        Ok(self.delays.lock().remove(&space).is_some())
    }
}

/// Transport that records what the engine asked it to do.
///
/// Spaces without a roster answer "not an administrator".
#[derive(Default)]
pub struct MockTransport {
    admins: Mutex<HashMap<SpaceId, HashSet<Identity>>>,
    removals: Mutex<Vec<(SpaceId, MessageId)>>,
    notices: Mutex<Vec<(SpaceId, String)>>,
    fail_oracle: AtomicBool,
    fail_removal: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_admins(&self, space: SpaceId, admins: &[Identity]) {
        self.admins
            .lock()
            .insert(space, admins.iter().copied().collect());
    }

    pub fn fail_oracle(&self, fail: bool) {
        self.fail_oracle.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removal(&self, fail: bool) {
        self.fail_removal.store(fail, Ordering::SeqCst);
    }

    pub fn removals(&self) -> Vec<(SpaceId, MessageId)> {
        self.removals.lock().clone()
    }

    pub fn notices(&self) -> Vec<(SpaceId, String)> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn is_administrator(
        &self,
        space: SpaceId,
        identity: Identity,
    ) -> Result<bool, TransportError> {
        if self.fail_oracle.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("oracle failure injected".into()));
        }
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
        // Recorded even when failing so tests can see the attempt.
        self.removals.lock().push((space, message));
        if self.fail_removal.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("message already deleted".into()));
        }
        Ok(())
    }

    async fn notify(&self, space: SpaceId, text: &str) -> Result<(), TransportError> {
        self.notices.lock().push((space, text.to_string()));
        Ok(())
    }
}
