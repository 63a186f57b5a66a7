//! Inbound event dispatch.
//!
//! Turns classified platform events into policy decisions and, for
//! non-exempt actors, removals. Handlers return as soon as the removal is
//! handed off; they never wait for the platform to delete anything.

use crate::delay::DelayConfig;
use crate::ids::{Identity, MessageId, SpaceId};
use crate::policy::{Decision, ExemptReason, PolicyEvaluator};
use crate::scheduler::{ActionKey, ActionScheduler, DeferredAction};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// What the router did with an event.
#[derive(Debug)]
pub enum Routed {
    /// Actor is exempt; nothing happens.
    Discarded(ExemptReason),
    /// Edit: removal dispatched without a grace window.
    RemovalDispatched(JoinHandle<()>),
    /// Media: removal scheduled after the space's grace window.
    Scheduled(Arc<DeferredAction>),
}

pub struct EventRouter {
    evaluator: Arc<PolicyEvaluator>,
    scheduler: Arc<ActionScheduler>,
    delays: Arc<DelayConfig>,
}

impl EventRouter {
    pub fn new(
        evaluator: Arc<PolicyEvaluator>,
        scheduler: Arc<ActionScheduler>,
        delays: Arc<DelayConfig>,
    ) -> Self {
        Self {
            evaluator,
            scheduler,
            delays,
        }
    }

    /// A message was edited. Non-exempt edits are removed immediately.
    pub async fn handle_edit(&self, actor: Identity, space: SpaceId, message: MessageId) -> Routed {
        match self.evaluator.decide(actor, space).await {
            Decision::Exempt(reason) => {
                debug!(%actor, %space, %message, reason = reason.as_str(), "Edit ignored");
                Routed::Discarded(reason)
            }
            Decision::NotExempt => Routed::RemovalDispatched(self.scheduler.remove_now(space, message)),
        }
    }

    /// Media or a sticker was posted. Non-exempt posts are removed after the
    /// space's grace window, unless the actor becomes exempt in between.
    pub async fn handle_media(&self, actor: Identity, space: SpaceId, message: MessageId) -> Routed {
        match self.evaluator.decide(actor, space).await {
            Decision::Exempt(reason) => {
                debug!(%actor, %space, %message, reason = reason.as_str(), "Media ignored");
                Routed::Discarded(reason)
            }
            Decision::NotExempt => {
                let delay = self.delays.get_duration(space).await;
                let key = ActionKey::new(space, message);
                Routed::Scheduled(self.scheduler.schedule(key, actor, delay))
            }
        }
    }

    /// The bot left or was removed from `space`.
    pub fn handle_space_removed(&self, space: SpaceId) -> usize {
        self.scheduler.cancel_all_for_space(space)
    }
}
