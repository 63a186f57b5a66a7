//! Top-level moderation state.
//!
//! The Engine owns every long-lived component and hands out shared
//! references to the event and command layers.

use crate::config::ModerationConfig;
use crate::db::{DelayStore, ExemptionStore};
use crate::delay::DelayConfig;
use crate::ids::{Identity, SpaceId};
use crate::policy::{ExemptionCache, PolicyEvaluator};
use crate::router::EventRouter;
use crate::scheduler::ActionScheduler;
use crate::services::AdminService;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::info;

/// Moderation engine state.
///
/// The Engine holds:
/// - The policy evaluator (exemption store plus administrator oracle)
/// - The deferred-removal scheduler
/// - Per-space grace windows
/// - The event router and administrative command service built on top
pub struct Engine {
    pub evaluator: Arc<PolicyEvaluator>,
    pub scheduler: Arc<ActionScheduler>,
    pub delays: Arc<DelayConfig>,
    pub router: EventRouter,
    pub admin: AdminService,
}

/// Parameters for creating a new Engine.
pub struct EngineParams<'a> {
    pub exemptions: Arc<dyn ExemptionStore>,
    pub delays: Arc<dyn DelayStore>,
    pub transport: Arc<dyn Transport>,
    pub owner: Identity,
    pub log_space: Option<SpaceId>,
    pub moderation: &'a ModerationConfig,
}

impl Engine {
    pub fn new(params: EngineParams<'_>) -> Self {
        let EngineParams {
            exemptions,
            delays,
            transport,
            owner,
            log_space,
            moderation,
        } = params;

        let cache = moderation
            .cache_exemptions
            .then(|| ExemptionCache::new(moderation.cache_capacity));

        let evaluator = Arc::new(PolicyEvaluator::new(
            exemptions,
            Arc::clone(&transport),
            owner,
            cache,
        ));
        let scheduler = Arc::new(ActionScheduler::new(
            Arc::clone(&evaluator),
            Arc::clone(&transport),
        ));
        let delays = Arc::new(DelayConfig::new(
            delays,
            moderation.default_delay_secs,
            moderation.max_delay_secs,
        ));
        let router = EventRouter::new(
            Arc::clone(&evaluator),
            Arc::clone(&scheduler),
            Arc::clone(&delays),
        );
        let admin = AdminService::new(
            Arc::clone(&evaluator),
            Arc::clone(&delays),
            transport,
            log_space,
        );

        info!(
            %owner,
            default_delay_secs = moderation.default_delay_secs,
            cache = moderation.cache_exemptions,
            "Moderation engine initialized"
        );

        Self {
            evaluator,
            scheduler,
            delays,
            router,
            admin,
        }
    }

    /// Cancel every pending removal. Returns how many were cancelled.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.scheduler.shutdown();
        info!(cancelled, "Moderation engine stopped");
        cancelled
    }
}
