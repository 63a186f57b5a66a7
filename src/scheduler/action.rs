//! Deferred action state machine.
//!
//! ```text
//! Pending ──fire──▶ Fired
//!    │
//!    └──cancel──▶ Cancelled
//! ```
//!
//! Both transitions start from `Pending` and are a single compare-and-swap,
//! so exactly one of a racing fire and cancel wins. The loser observes a
//! terminal state and does nothing.

use crate::ids::{Identity, MessageId, SpaceId};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifies the event a removal belongs to: one action per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub space: SpaceId,
    pub message: MessageId,
}

impl ActionKey {
    pub fn new(space: SpaceId, message: MessageId) -> Self {
        Self { space, message }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionState {
    Pending = 0,
    Fired = 1,
    Cancelled = 2,
}

impl ActionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ActionState::Pending,
            1 => ActionState::Fired,
            _ => ActionState::Cancelled,
        }
    }
}

/// Why a pending action was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer event with the same key replaced it.
    Superseded,
    /// Explicit `cancel(key)`.
    Revoked,
    /// The space was torn down.
    SpaceRemoved,
    /// The actor became exempt before the action fired.
    Amnesty,
    /// Process shutdown.
    Shutdown,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Superseded => "superseded",
            Self::Revoked => "revoked",
            Self::SpaceRemoved => "space_removed",
            Self::Amnesty => "amnesty",
            Self::Shutdown => "shutdown",
        }
    }
}

/// One scheduled removal.
#[derive(Debug)]
pub struct DeferredAction {
    id: Uuid,
    key: ActionKey,
    actor: Identity,
    not_before: Instant,
    state: AtomicU8,
    wakeup: CancellationToken,
}

impl DeferredAction {
    pub(crate) fn new(key: ActionKey, actor: Identity, not_before: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            actor,
            not_before,
            state: AtomicU8::new(ActionState::Pending as u8),
            wakeup: CancellationToken::new(),
        }
    }

    /// Unique per scheduled instance; two actions for the same key differ here.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> ActionKey {
        self.key
    }

    pub fn space(&self) -> SpaceId {
        self.key.space
    }

    pub fn target_message(&self) -> MessageId {
        self.key.message
    }

    pub fn actor(&self) -> Identity {
        self.actor
    }

    pub fn not_before(&self) -> Instant {
        self.not_before
    }

    pub fn state(&self) -> ActionState {
        ActionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ActionState::Pending
    }

    /// Pending -> Fired. Returns `true` if this call made the transition.
    pub(crate) fn try_fire(&self) -> bool {
        self.transition(ActionState::Fired)
    }

    /// Pending -> Cancelled. Returns `true` if this call made the transition.
    /// Wakes the timer task so it does not linger until `not_before`.
    pub(crate) fn try_cancel(&self) -> bool {
        let won = self.transition(ActionState::Cancelled);
        if won {
            self.wakeup.cancel();
        }
        won
    }

    /// Resolves once the action has been cancelled.
    pub(crate) async fn cancelled(&self) {
        self.wakeup.cancelled().await
    }

    fn transition(&self, to: ActionState) -> bool {
        self.state
            .compare_exchange(
                ActionState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action() -> DeferredAction {
        DeferredAction::new(
            ActionKey::new(SpaceId(-1), MessageId(42)),
            Identity(7),
            Instant::now(),
        )
    }

    #[test]
    fn starts_pending() {
        let a = action();
        assert_eq!(a.state(), ActionState::Pending);
        assert_eq!(a.key().to_string(), "-1:42");
    }

    #[test]
    fn fire_wins_then_cancel_is_a_no_op() {
        let a = action();
        assert!(a.try_fire());
        assert!(!a.try_cancel());
        assert_eq!(a.state(), ActionState::Fired);
    }

    #[test]
    fn cancel_wins_then_fire_is_a_no_op() {
        let a = action();
        assert!(a.try_cancel());
        assert!(!a.try_fire());
        assert!(!a.try_cancel());
        assert_eq!(a.state(), ActionState::Cancelled);
    }

    #[test]
    fn racing_threads_see_exactly_one_winner() {
        use std::sync::Arc;

        for _ in 0..200 {
            let a = Arc::new(action());
            let firing = {
                let a = Arc::clone(&a);
                std::thread::spawn(move || a.try_fire())
            };
            let cancelling = {
                let a = Arc::clone(&a);
                std::thread::spawn(move || a.try_cancel())
            };
            let fired = firing.join().unwrap();
            let cancelled = cancelling.join().unwrap();
            assert!(fired ^ cancelled);
            let expected = if fired {
                ActionState::Fired
            } else {
                ActionState::Cancelled
            };
            assert_eq!(a.state(), expected);
        }
    }
}
