//! Keyed deferred-removal scheduler.
//!
//! Every pending removal lives in one index keyed by [`ActionKey`] and owns
//! an independent timer task. There is no global lock: the index is sharded
//! and each action's lifecycle is a compare-and-swap on its own state.
//!
//! # Invariants
//!
//! - At most one `Pending` action per key. `schedule` replaces and cancels the
//!   previous entry while holding that key's shard lock.
//! - An action executes at most once, and never after a successful cancel.
//! - When the timer expires the policy is evaluated again; an actor who
//!   became exempt in the meantime gets amnesty.
//! - A failed removal still counts as `Fired` and is not retried.

mod action;

pub use action::{ActionKey, ActionState, CancelReason, DeferredAction};

use crate::ids::{Identity, MessageId, SpaceId};
use crate::metrics;
use crate::policy::PolicyEvaluator;
use crate::transport::Transport;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Deadline used when `now + delay` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

pub struct ActionScheduler {
    actions: Arc<DashMap<ActionKey, Arc<DeferredAction>>>,
    evaluator: Arc<PolicyEvaluator>,
    transport: Arc<dyn Transport>,
}

impl ActionScheduler {
    pub fn new(evaluator: Arc<PolicyEvaluator>, transport: Arc<dyn Transport>) -> Self {
        Self {
            actions: Arc::new(DashMap::new()),
            evaluator,
            transport,
        }
    }

    /// Schedule a removal of `key`'s message, authored by `actor`, after `delay`.
    ///
    /// A pending action with the same key is cancelled and replaced. Returns
    /// immediately; the removal runs on its own task.
    pub fn schedule(&self, key: ActionKey, actor: Identity, delay: Duration) -> Arc<DeferredAction> {
        let now = Instant::now();
        let not_before = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        let action = Arc::new(DeferredAction::new(key, actor, not_before));

        match self.actions.entry(key) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(Arc::clone(&action));
                if previous.try_cancel() {
                    metrics::record_cancelled(CancelReason::Superseded.as_str());
                    debug!(%key, previous = %previous.id(), "Superseded pending action");
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&action));
            }
        }

        metrics::record_scheduled();
        metrics::set_pending(count_pending(&self.actions));
        debug!(%key, %actor, id = %action.id(), delay_secs = delay.as_secs(), "Action scheduled");

        self.spawn_timer(Arc::clone(&action));
        action
    }

    /// Cancel the pending action for `key`.
    ///
    /// Returns `true` if a pending action was cancelled; `false` when it had
    /// already fired, was already cancelled, or never existed.
    pub fn cancel(&self, key: &ActionKey) -> bool {
        self.cancel_with(key, CancelReason::Revoked)
    }

    fn cancel_with(&self, key: &ActionKey, reason: CancelReason) -> bool {
        let Some((_, action)) = self.actions.remove(key) else {
            return false;
        };
        metrics::set_pending(count_pending(&self.actions));

        let won = action.try_cancel();
        if won {
            metrics::record_cancelled(reason.as_str());
            debug!(%key, id = %action.id(), reason = reason.as_str(), "Action cancelled");
        }
        won
    }

    /// Cancel every pending action in `space`. Actions that already fired
    /// are dropped from the index but otherwise untouched.
    pub fn cancel_all_for_space(&self, space: SpaceId) -> usize {
        let cancelled = self.cancel_matching(|key| key.space == space, CancelReason::SpaceRemoved);
        if cancelled > 0 {
            info!(%space, cancelled, "Cancelled pending actions for space");
        }
        cancelled
    }

    /// Cancel everything. Used on process shutdown.
    pub fn shutdown(&self) -> usize {
        let cancelled = self.cancel_matching(|_| true, CancelReason::Shutdown);
        info!(cancelled, "Scheduler shut down");
        cancelled
    }

    fn cancel_matching(&self, matches: impl Fn(&ActionKey) -> bool, reason: CancelReason) -> usize {
        let mut cancelled = 0;
        self.actions.retain(|key, action| {
            if !matches(key) {
                return true;
            }
            if action.try_cancel() {
                cancelled += 1;
                metrics::record_cancelled(reason.as_str());
            }
            false
        });
        metrics::set_pending(count_pending(&self.actions));
        cancelled
    }

    /// Remove a message right away, bypassing the grace window.
    ///
    /// A pending deferred removal for the same message is superseded: the
    /// message is about to be gone either way.
    pub fn remove_now(&self, space: SpaceId, message: MessageId) -> JoinHandle<()> {
        self.cancel_with(&ActionKey::new(space, message), CancelReason::Superseded);

        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            match transport.remove_content(space, message).await {
                Ok(()) => {
                    metrics::record_edit_removed();
                    debug!(%space, %message, "Edited message removed");
                }
                Err(e) => {
                    metrics::record_removal_failure();
                    warn!(%space, %message, error = %e, "Failed to remove edited message");
                }
            }
        })
    }

    /// Current action for `key`, if it is still indexed.
    pub fn get(&self, key: &ActionKey) -> Option<Arc<DeferredAction>> {
        self.actions.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Number of indexed actions still `Pending`. Actions that fired and
    /// are waiting on the platform are not counted.
    pub fn pending_count(&self) -> usize {
        count_pending(&self.actions)
    }

    fn spawn_timer(&self, action: Arc<DeferredAction>) {
        let actions = Arc::clone(&self.actions);
        let evaluator = Arc::clone(&self.evaluator);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            tokio::select! {
                _ = action.cancelled() => {}
                _ = tokio::time::sleep_until(action.not_before()) => {
                    fire(&action, &evaluator, transport.as_ref()).await;
                }
            }

            // Only drop our own entry; a newer action may already own the key.
            actions.remove_if(&action.key(), |_, current| Arc::ptr_eq(current, &action));
            metrics::set_pending(count_pending(&actions));
        });
    }
}

fn count_pending(actions: &DashMap<ActionKey, Arc<DeferredAction>>) -> usize {
    actions.iter().filter(|entry| entry.value().is_pending()).count()
}

/// Timer expiry: re-evaluate, then claim the action and remove the content.
async fn fire(action: &DeferredAction, evaluator: &PolicyEvaluator, transport: &dyn Transport) {
    if !action.is_pending() {
        return;
    }

    let key = action.key();
    let decision = evaluator.decide(action.actor(), action.space()).await;

    if decision.is_exempt() {
        if action.try_cancel() {
            metrics::record_cancelled(CancelReason::Amnesty.as_str());
            info!(%key, actor = %action.actor(), ?decision, "Actor exempt at fire time, removal skipped");
        }
        return;
    }

    // A cancel may have landed while the policy was being evaluated.
    if !action.try_fire() {
        debug!(%key, "Action cancelled before it could fire");
        return;
    }
    metrics::record_fired();

    match transport.remove_content(action.space(), action.target_message()).await {
        Ok(()) => {
            info!(%key, actor = %action.actor(), "Deferred removal executed");
        }
        Err(e) => {
            metrics::record_removal_failure();
            warn!(%key, error = %e, "Deferred removal failed, not retrying");
        }
    }
}
