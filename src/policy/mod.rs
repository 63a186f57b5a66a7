//! Exemption policy evaluation.
//!
//! [`PolicyEvaluator::decide`] answers one question: may this actor's
//! content in this space be removed? The answer is re-computed when a
//! deferred removal fires, not only when it is scheduled.
//!
//! Lookup failures fail open: an unreachable store or oracle yields
//! [`Decision::Exempt`] with [`ExemptReason::LookupFailed`], because wrongly
//! deleting an administrator's message is worse than letting one through.

mod cache;

pub use cache::ExemptionCache;

use crate::db::{DbError, ExemptionRecord, ExemptionStore};
use crate::ids::{Identity, Scope, SpaceId};
use crate::metrics;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why an actor was found exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExemptReason {
    Global,
    Space,
    Owner,
    Administrator,
    LookupFailed,
}

impl ExemptReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Space => "space",
            Self::Owner => "owner",
            Self::Administrator => "administrator",
            Self::LookupFailed => "lookup_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Exempt(ExemptReason),
    NotExempt,
}

impl Decision {
    pub fn is_exempt(&self) -> bool {
        matches!(self, Decision::Exempt(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Decision::Exempt(reason) => reason.as_str(),
            Decision::NotExempt => "not_exempt",
        }
    }
}

pub struct PolicyEvaluator {
    store: Arc<dyn ExemptionStore>,
    transport: Arc<dyn Transport>,
    owner: Identity,
    cache: Option<ExemptionCache>,
}

impl PolicyEvaluator {
    pub fn new(
        store: Arc<dyn ExemptionStore>,
        transport: Arc<dyn Transport>,
        owner: Identity,
        cache: Option<ExemptionCache>,
    ) -> Self {
        Self {
            store,
            transport,
            owner,
            cache,
        }
    }

    pub fn owner(&self) -> Identity {
        self.owner
    }

    /// Decide whether `identity` is exempt in `space`.
    ///
    /// Checks, in order: global exemption, space exemption, owner, space
    /// administrator. Any one is sufficient.
    pub async fn decide(&self, identity: Identity, space: SpaceId) -> Decision {
        let decision = self.evaluate(identity, space).await;
        metrics::record_decision(decision.label());
        debug!(%identity, %space, decision = decision.label(), "Policy decision");
        decision
    }

    async fn evaluate(&self, identity: Identity, space: SpaceId) -> Decision {
        for (scope, reason) in [
            (Scope::Global, ExemptReason::Global),
            (Scope::Space(space), ExemptReason::Space),
        ] {
            match self.is_exempt(scope, identity).await {
                Ok(true) => return Decision::Exempt(reason),
                Ok(false) => {}
                Err(e) => {
                    warn!(%identity, %space, %scope, error = %e, "Exemption lookup failed, treating as exempt");
                    metrics::record_lookup_failure("store");
                    return Decision::Exempt(ExemptReason::LookupFailed);
                }
            }
        }

        if identity == self.owner {
            return Decision::Exempt(ExemptReason::Owner);
        }

        match self.transport.is_administrator(space, identity).await {
            Ok(true) => Decision::Exempt(ExemptReason::Administrator),
            Ok(false) => Decision::NotExempt,
            Err(e) => {
                warn!(%identity, %space, error = %e, "Administrator lookup failed, treating as exempt");
                metrics::record_lookup_failure("oracle");
                Decision::Exempt(ExemptReason::LookupFailed)
            }
        }
    }

    /// Store lookup through the cache, when enabled.
    pub async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        let Some(cache) = &self.cache else {
            return self.store.is_exempt(scope, identity).await;
        };

        if let Some(hit) = cache.get(scope, identity) {
            return Ok(hit);
        }

        let observed = cache.generation();
        let exempt = self.store.is_exempt(scope, identity).await?;
        cache.fill(scope, identity, exempt, observed);
        Ok(exempt)
    }

    /// Persist a grant, then invalidate the cached entry.
    pub async fn grant(
        &self,
        scope: Scope,
        identity: Identity,
        granted_by: Identity,
    ) -> Result<(), DbError> {
        self.store.grant(scope, identity, granted_by).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate(scope, identity);
        }
        Ok(())
    }

    /// Persist a revoke, then invalidate the cached entry.
    pub async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
        let existed = self.store.revoke(scope, identity).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate(scope, identity);
        }
        Ok(existed)
    }

    pub async fn list(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError> {
        self.store.list_exempt(scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, MockTransport};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    const OWNER: Identity = Identity(1);
    const ADMIN: Identity = Identity(2);
    const U1: Identity = Identity(10);
    const S1: SpaceId = SpaceId(-100);
    const S2: SpaceId = SpaceId(-200);

    fn evaluator(store: Arc<MemoryStore>, transport: Arc<MockTransport>, cached: bool) -> PolicyEvaluator {
        let cache = cached.then(|| ExemptionCache::new(1024));
        PolicyEvaluator::new(store, transport, OWNER, cache)
    }

    #[tokio::test]
    async fn plain_member_is_not_exempt() {
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[ADMIN]);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, false);

        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
    }

    #[tokio::test]
    async fn global_exemption_dominates_every_space() {
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        transport.set_admins(S2, &[]);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, true);

        policy.grant(Scope::Global, U1, OWNER).await.unwrap();

        assert_eq!(policy.decide(U1, S1).await, Decision::Exempt(ExemptReason::Global));
        assert_eq!(policy.decide(U1, S2).await, Decision::Exempt(ExemptReason::Global));
    }

    #[tokio::test]
    async fn space_exemption_is_local() {
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        transport.set_admins(S2, &[]);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, true);

        policy.grant(Scope::Space(S1), U1, ADMIN).await.unwrap();

        assert_eq!(policy.decide(U1, S1).await, Decision::Exempt(ExemptReason::Space));
        assert_eq!(policy.decide(U1, S2).await, Decision::NotExempt);
    }

    #[tokio::test]
    async fn owner_and_administrators_are_exempt() {
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[ADMIN]);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, false);

        assert_eq!(policy.decide(OWNER, S1).await, Decision::Exempt(ExemptReason::Owner));
        assert_eq!(
            policy.decide(ADMIN, S1).await,
            Decision::Exempt(ExemptReason::Administrator)
        );
    }

    #[tokio::test]
    async fn oracle_failure_fails_open() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_oracle(true);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, false);

        assert_eq!(
            policy.decide(U1, S1).await,
            Decision::Exempt(ExemptReason::LookupFailed)
        );
    }

    #[tokio::test]
    async fn store_read_failure_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.fail_reads(true);
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        let policy = evaluator(store, transport, false);

        assert_eq!(
            policy.decide(U1, S1).await,
            Decision::Exempt(ExemptReason::LookupFailed)
        );
    }

    #[tokio::test]
    async fn revoke_is_visible_through_the_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, true);

        // Warm the cache with "not exempt", then flip it twice.
        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
        policy.grant(Scope::Space(S1), U1, ADMIN).await.unwrap();
        assert!(policy.decide(U1, S1).await.is_exempt());
        assert!(policy.revoke(Scope::Space(S1), U1).await.unwrap());
        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        let policy = evaluator(Arc::clone(&store), transport, true);

        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
        store.fail_writes(true);
        assert!(policy.grant(Scope::Space(S1), U1, ADMIN).await.is_err());
        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
    }

    #[tokio::test]
    async fn grant_and_revoke_are_idempotent() {
        let transport = Arc::new(MockTransport::new());
        let policy = evaluator(Arc::new(MemoryStore::new()), transport, true);
        let scope = Scope::Space(S1);

        policy.grant(scope, U1, ADMIN).await.unwrap();
        policy.grant(scope, U1, ADMIN).await.unwrap();
        assert!(policy.is_exempt(scope, U1).await.unwrap());
        assert_eq!(policy.list(scope).await.unwrap().len(), 1);

        assert!(policy.revoke(scope, U1).await.unwrap());
        assert!(!policy.revoke(scope, U1).await.unwrap());
        assert!(!policy.is_exempt(scope, U1).await.unwrap());
    }

    /// Store whose grants commit and then stall until released.
    struct StallingStore {
        inner: MemoryStore,
        committed: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ExemptionStore for StallingStore {
        async fn grant(
            &self,
            scope: Scope,
            identity: Identity,
            granted_by: Identity,
        ) -> Result<(), DbError> {
            self.inner.grant(scope, identity, granted_by).await?;
            self.committed.notify_one();
            self.release.notified().await;
            Ok(())
        }

        async fn revoke(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
            self.inner.revoke(scope, identity).await
        }

        async fn is_exempt(&self, scope: Scope, identity: Identity) -> Result<bool, DbError> {
            self.inner.is_exempt(scope, identity).await
        }

        async fn list_exempt(&self, scope: Scope) -> Result<Vec<ExemptionRecord>, DbError> {
            self.inner.list_exempt(scope).await
        }
    }

    #[tokio::test]
    async fn writers_returning_out_of_order_do_not_poison_the_cache() {
        let store = Arc::new(StallingStore {
            inner: MemoryStore::new(),
            committed: Notify::new(),
            release: Notify::new(),
        });
        let transport = Arc::new(MockTransport::new());
        transport.set_admins(S1, &[]);
        let policy = Arc::new(PolicyEvaluator::new(
            Arc::clone(&store) as Arc<dyn ExemptionStore>,
            transport,
            OWNER,
            Some(ExemptionCache::new(1024)),
        ));
        let scope = Scope::Space(S1);
        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);

        // Grant commits first but returns last.
        let granting = {
            let policy = Arc::clone(&policy);
            tokio::spawn(async move { policy.grant(scope, U1, ADMIN).await })
        };
        store.committed.notified().await;
        assert!(policy.revoke(scope, U1).await.unwrap());
        store.release.notify_one();
        granting.await.unwrap().unwrap();

        assert!(!store.inner.is_exempt(scope, U1).await.unwrap());
        assert_eq!(policy.decide(U1, S1).await, Decision::NotExempt);
    }
}
