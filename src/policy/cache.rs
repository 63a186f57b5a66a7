//! Read-through exemption cache.
//!
//! Sits above the [`ExemptionStore`](crate::db::ExemptionStore) so hot
//! senders do not hit SQLite on every event. Writers never publish values:
//! after the durable write commits they invalidate the entry, and the next
//! read refills it from the store. Concurrent writers may return in any
//! order, so only the store knows which write was last.
//!
//! # Stale fills
//!
//! A reader may load a value from the store, lose the CPU, and try to cache
//! it after a writer already committed a newer one. Every invalidation bumps
//! a generation counter; a fill is only accepted if the generation it
//! observed before reading the store is still current, checked under the
//! shard lock.

use crate::ids::{Identity, Scope};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct ExemptionCache {
    entries: DashMap<(Scope, Identity), bool>,
    generation: AtomicU64,
    capacity: usize,
}

impl ExemptionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            capacity,
        }
    }

    pub fn get(&self, scope: Scope, identity: Identity) -> Option<bool> {
        self.entries.get(&(scope, identity)).map(|e| *e.value())
    }

    /// Snapshot to pass back into [`ExemptionCache::fill`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cache a value read from the store at `observed` generation.
    pub fn fill(&self, scope: Scope, identity: Identity, exempt: bool, observed: u64) {
        if self.entries.len() >= self.capacity {
            return;
        }
        if let Entry::Vacant(slot) = self.entries.entry((scope, identity))
            && self.generation.load(Ordering::Acquire) == observed
        {
            slot.insert(exempt);
        }
    }

    /// Forget `(scope, identity)` after a committed grant or revoke.
    pub fn invalidate(&self, scope: Scope, identity: Identity) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&(scope, identity));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
