//! Turn state machine.
//!
//! [`TurnState`] is the authoritative model for one surface: who holds the
//! slot, since when, and who is waiting.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Every request goes through [`TurnState::apply`]
//! - Time and the handover policy are passed in, nothing is stored
//! - The return value lists the effects the runtime must carry out
//!
//! # Invariants
//!
//! Every transition preserves all three, whatever the input:
//!
//! - No holder means no start time
//! - No user appears twice in the queue
//! - The holder is never in the queue
//!
//! # Transitions
//!
//! ```text
//!              Acquire(u)                    Release(holder) / ForceRelease
//! ┌──────┐ ──────────────> ┌────────────┐ ─────────────────────────────────┐
//! │ Free │                 │ Held by u  │                                  │
//! └──────┘ <────────────── └────────────┘ <── AutoAdvance: pop queue head ─┘
//!             Manual, or queue empty
//! ```

use std::collections::VecDeque;

use tracing::trace;

use crate::{
    config::HandoverPolicy,
    control::Control,
    ids::{Timestamp, UserId},
    log::{LogEntry, LogKind},
};

/// A request against the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Take the slot if free, otherwise wait in the queue.
    Acquire(UserId),
    /// Give the slot back. Only the holder may do this.
    Release(UserId),
    /// Wait in the queue.
    Enqueue(UserId),
    /// Clear the holder, whoever they are.
    ForceRelease {
        /// User pressing the control
        actor: UserId,
    },
    /// Administrative removal of a user from the slot and/or the queue.
    Remove {
        /// User to remove
        target: UserId,
        /// Administrator issuing the removal
        actor: UserId,
    },
    /// The hold timer for `holder` ran out.
    Expire {
        /// Holder the timer was started for
        holder: UserId,
    },
}

impl Request {
    /// The request a press of `control` by `actor` maps to.
    pub fn from_control(control: Control, actor: UserId) -> Self {
        match control {
            Control::Start => Request::Acquire(actor),
            Control::Release => Request::Release(actor),
            Control::Queue => Request::Enqueue(actor),
            Control::ForceRelease => Request::ForceRelease { actor },
        }
    }
}

/// Effects produced by a transition.
///
/// The runtime executes these:
/// - `Render`: re-render the panel and reconcile it with the surface
/// - `Log`: append the entry to the log sub-surface
/// - `HolderChanged`: restart (or cancel) the hold timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAction {
    /// The panel must be re-rendered.
    Render,
    /// Append this entry to the turn log.
    Log(LogEntry),
    /// The holder changed; `None` means the slot became free.
    HolderChanged {
        /// New holder
        holder: Option<UserId>,
    },
}

/// Slot occupancy and waiting queue for one surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnState {
    holder: Option<UserId>,
    holder_started_at: Option<Timestamp>,
    queue: VecDeque<UserId>,
}

impl TurnState {
    /// Empty state: slot free, nobody waiting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<UserId> {
        self.holder
    }

    /// When the current holder took the slot.
    pub fn holder_started_at(&self) -> Option<Timestamp> {
        self.holder_started_at
    }

    /// Waiting users, front of the queue first.
    pub fn queue(&self) -> &VecDeque<UserId> {
        &self.queue
    }

    /// Whether nobody holds the slot.
    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    /// Zero-based queue position of `user`.
    pub fn position(&self, user: UserId) -> Option<usize> {
        self.queue.iter().position(|&waiting| waiting == user)
    }

    /// Check all state invariants.
    pub fn is_consistent(&self) -> bool {
        if self.holder.is_none() != self.holder_started_at.is_none() {
            return false;
        }
        if let Some(holder) = self.holder {
            if self.queue.contains(&holder) {
                return false;
            }
        }
        self.queue.iter().enumerate().all(|(i, user)| !self.queue.iter().skip(i + 1).any(|u| u == user))
    }

    /// Apply a request and return the effects to execute.
    ///
    /// Requests a user is not entitled to (release by a non-holder,
    /// force-release of a free slot, removal of an absent user) leave the
    /// state untouched and return no actions.
    ///
    /// # Arguments
    /// * `request` - What was asked for
    /// * `now` - Current time, recorded as the start of a new turn
    /// * `handover` - Whether the queue head takes over on release
    pub fn apply(
        &mut self,
        request: Request,
        now: Timestamp,
        handover: HandoverPolicy,
    ) -> Vec<SlotAction> {
        let actions = match request {
            Request::Acquire(user) => self.acquire(user, now),
            Request::Release(user) => self.release(user, now, handover),
            Request::Enqueue(user) => self.enqueue(user),
            Request::ForceRelease { actor } => self.force_release(actor, now, handover),
            Request::Remove { target, actor } => self.remove(target, actor, now, handover),
            Request::Expire { holder } => self.expire(holder, now, handover),
        };
        debug_assert!(self.is_consistent());
        if actions.is_empty() {
            trace!(?request, holder = ?self.holder, "request ignored");
        }
        actions
    }

    fn acquire(&mut self, user: UserId, now: Timestamp) -> Vec<SlotAction> {
        match self.holder {
            None => {
                self.queue.retain(|&waiting| waiting != user);
                self.holder = Some(user);
                self.holder_started_at = Some(now);
                vec![SlotAction::HolderChanged { holder: Some(user) }, SlotAction::Render]
            },
            Some(holder) if holder == user => vec![SlotAction::Render],
            Some(_) => {
                if !self.queue.contains(&user) {
                    self.queue.push_back(user);
                }
                vec![SlotAction::Render]
            },
        }
    }

    fn release(&mut self, user: UserId, now: Timestamp, handover: HandoverPolicy) -> Vec<SlotAction> {
        if self.holder != Some(user) {
            return Vec::new();
        }

        let entry = LogEntry { actor: user, target: user, kind: LogKind::Completed, at: now };
        let mut actions = vec![SlotAction::Log(entry)];
        actions.extend(self.vacate(now, handover));
        actions
    }

    fn enqueue(&mut self, user: UserId) -> Vec<SlotAction> {
        if self.holder == Some(user) || self.queue.contains(&user) {
            return Vec::new();
        }

        self.queue.push_back(user);
        vec![SlotAction::Render]
    }

    fn force_release(
        &mut self,
        actor: UserId,
        now: Timestamp,
        handover: HandoverPolicy,
    ) -> Vec<SlotAction> {
        let Some(target) = self.holder else {
            return Vec::new();
        };

        let entry = LogEntry { actor, target, kind: LogKind::ForcedRelease, at: now };
        let mut actions = vec![SlotAction::Log(entry)];
        actions.extend(self.vacate(now, handover));
        actions
    }

    fn remove(
        &mut self,
        target: UserId,
        actor: UserId,
        now: Timestamp,
        handover: HandoverPolicy,
    ) -> Vec<SlotAction> {
        let mut actions = Vec::new();

        // Queue and holder are checked independently.
        if let Some(index) = self.position(target) {
            self.queue.remove(index);
            actions.push(SlotAction::Log(LogEntry {
                actor,
                target,
                kind: LogKind::Removed,
                at: now,
            }));
        }

        if self.holder == Some(target) {
            actions.push(SlotAction::Log(LogEntry {
                actor,
                target,
                kind: LogKind::ForcedRelease,
                at: now,
            }));
            actions.extend(self.vacate(now, handover));
        } else if !actions.is_empty() {
            actions.push(SlotAction::Render);
        }

        actions
    }

    fn expire(&mut self, holder: UserId, now: Timestamp, handover: HandoverPolicy) -> Vec<SlotAction> {
        if self.holder != Some(holder) {
            return Vec::new();
        }

        let entry = LogEntry { actor: holder, target: holder, kind: LogKind::Expired, at: now };
        let mut actions = vec![SlotAction::Log(entry)];
        actions.extend(self.vacate(now, handover));
        actions
    }

    /// Clear the holder and, under auto-advance, promote the queue head.
    fn vacate(&mut self, now: Timestamp, handover: HandoverPolicy) -> Vec<SlotAction> {
        self.holder = None;
        self.holder_started_at = None;

        if handover == HandoverPolicy::AutoAdvance {
            if let Some(next) = self.queue.pop_front() {
                self.holder = Some(next);
                self.holder_started_at = Some(now);
            }
        }

        vec![SlotAction::HolderChanged { holder: self.holder }, SlotAction::Render]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const U1: UserId = UserId(1);
    const U2: UserId = UserId(2);
    const U3: UserId = UserId(3);
    const ADMIN: UserId = UserId(99);

    fn t(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn state_with(holder: UserId, queue: &[UserId]) -> TurnState {
        let mut state = TurnState::new();
        state.apply(Request::Acquire(holder), t(100), HandoverPolicy::Manual);
        for &user in queue {
            state.apply(Request::Enqueue(user), t(101), HandoverPolicy::Manual);
        }
        state
    }

    fn logs(actions: &[SlotAction]) -> Vec<LogEntry> {
        actions
            .iter()
            .filter_map(|a| match a {
                SlotAction::Log(entry) => Some(*entry),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn acquire_free_slot() {
        let mut state = TurnState::new();
        let actions = state.apply(Request::Acquire(U1), t(100), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U1));
        assert_eq!(state.holder_started_at(), Some(t(100)));
        assert!(state.queue().is_empty());
        assert_eq!(
            actions,
            vec![SlotAction::HolderChanged { holder: Some(U1) }, SlotAction::Render]
        );
    }

    #[test]
    fn acquire_held_slot_enqueues() {
        let mut state = state_with(U1, &[]);
        let actions = state.apply(Request::Acquire(U2), t(200), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U1));
        assert_eq!(state.holder_started_at(), Some(t(100)));
        assert_eq!(state.queue(), &VecDeque::from([U2]));
        assert_eq!(actions, vec![SlotAction::Render]);
    }

    #[test]
    fn acquire_by_holder_only_renders() {
        let mut state = state_with(U1, &[U2]);
        let before = state.clone();
        let actions = state.apply(Request::Acquire(U1), t(200), HandoverPolicy::AutoAdvance);

        assert_eq!(state, before);
        assert_eq!(actions, vec![SlotAction::Render]);
    }

    #[test]
    fn acquire_free_slot_leaves_queue() {
        // Manual handover leaves waiters behind a free slot.
        let mut state = state_with(U1, &[U2, U3]);
        state.apply(Request::Release(U1), t(150), HandoverPolicy::Manual);
        assert!(state.is_free());

        state.apply(Request::Acquire(U3), t(160), HandoverPolicy::Manual);
        assert_eq!(state.holder(), Some(U3));
        assert_eq!(state.queue(), &VecDeque::from([U2]));
    }

    #[test]
    fn release_with_auto_handover() {
        let mut state = state_with(U1, &[U2, U3]);
        let actions = state.apply(Request::Release(U1), t(300), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U2));
        assert_eq!(state.holder_started_at(), Some(t(300)));
        assert_eq!(state.queue(), &VecDeque::from([U3]));

        let entries = logs(&actions);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LogKind::Completed);
        assert_eq!(entries[0].target, U1);
        assert!(actions.contains(&SlotAction::HolderChanged { holder: Some(U2) }));
    }

    #[test]
    fn release_with_manual_handover() {
        let mut state = state_with(U1, &[U2]);
        let actions = state.apply(Request::Release(U1), t(300), HandoverPolicy::Manual);

        assert!(state.is_free());
        assert_eq!(state.holder_started_at(), None);
        assert_eq!(state.queue(), &VecDeque::from([U2]));
        assert!(actions.contains(&SlotAction::HolderChanged { holder: None }));
    }

    #[test]
    fn release_by_wrong_user_is_ignored() {
        let mut state = state_with(U1, &[U3]);
        let before = state.clone();
        let actions = state.apply(Request::Release(U2), t(300), HandoverPolicy::AutoAdvance);

        assert_eq!(state, before);
        assert!(actions.is_empty());
    }

    #[test]
    fn enqueue_rules() {
        let mut state = state_with(U1, &[]);

        assert!(state.apply(Request::Enqueue(U1), t(1), HandoverPolicy::Manual).is_empty());
        assert_eq!(
            state.apply(Request::Enqueue(U2), t(1), HandoverPolicy::Manual),
            vec![SlotAction::Render]
        );
        assert!(state.apply(Request::Enqueue(U2), t(1), HandoverPolicy::Manual).is_empty());
        assert_eq!(state.queue(), &VecDeque::from([U2]));
    }

    #[test]
    fn enqueue_on_free_slot_waits() {
        let mut state = TurnState::new();
        state.apply(Request::Enqueue(U1), t(1), HandoverPolicy::AutoAdvance);

        assert!(state.is_free());
        assert_eq!(state.queue(), &VecDeque::from([U1]));
    }

    #[test]
    fn force_release_logs_actor_and_target() {
        let mut state = state_with(U1, &[U2]);
        let actions = state.apply(Request::ForceRelease { actor: ADMIN }, t(400), HandoverPolicy::Manual);

        assert!(state.is_free());
        assert_eq!(state.queue(), &VecDeque::from([U2]));
        assert_eq!(
            logs(&actions),
            vec![LogEntry { actor: ADMIN, target: U1, kind: LogKind::ForcedRelease, at: t(400) }]
        );
    }

    #[test]
    fn force_release_hands_over() {
        let mut state = state_with(U1, &[U2]);
        state.apply(Request::ForceRelease { actor: ADMIN }, t(400), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U2));
        assert!(state.queue().is_empty());
    }

    #[test]
    fn force_release_on_free_slot_is_noop() {
        let mut state = TurnState::new();
        let actions = state.apply(Request::ForceRelease { actor: ADMIN }, t(1), HandoverPolicy::Manual);
        assert!(actions.is_empty());
        assert_eq!(state, TurnState::new());
    }

    #[test]
    fn remove_from_queue_only() {
        let mut state = state_with(U1, &[U2, U3]);
        let actions =
            state.apply(Request::Remove { target: U2, actor: ADMIN }, t(500), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U1));
        assert_eq!(state.queue(), &VecDeque::from([U3]));
        assert_eq!(
            logs(&actions),
            vec![LogEntry { actor: ADMIN, target: U2, kind: LogKind::Removed, at: t(500) }]
        );
        assert!(actions.contains(&SlotAction::Render));
        assert!(!actions.iter().any(|a| matches!(a, SlotAction::HolderChanged { .. })));
    }

    #[test]
    fn remove_holder_acts_like_force_release() {
        let mut state = state_with(U1, &[U2]);
        let actions =
            state.apply(Request::Remove { target: U1, actor: ADMIN }, t(500), HandoverPolicy::AutoAdvance);

        assert_eq!(state.holder(), Some(U2));
        assert_eq!(logs(&actions)[0].kind, LogKind::ForcedRelease);
    }

    #[test]
    fn remove_absent_user_is_noop() {
        let mut state = state_with(U1, &[U2]);
        let before = state.clone();
        let actions =
            state.apply(Request::Remove { target: U3, actor: ADMIN }, t(500), HandoverPolicy::AutoAdvance);

        assert!(actions.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut state = state_with(U1, &[U2]);
        state.apply(Request::Release(U1), t(200), HandoverPolicy::AutoAdvance);

        // Timer was armed for U1, but U2 holds the slot now.
        let actions = state.apply(Request::Expire { holder: U1 }, t(300), HandoverPolicy::AutoAdvance);
        assert!(actions.is_empty());
        assert_eq!(state.holder(), Some(U2));
    }

    #[test]
    fn expiry_clears_holder() {
        let mut state = state_with(U1, &[]);
        let actions = state.apply(Request::Expire { holder: U1 }, t(300), HandoverPolicy::AutoAdvance);

        assert!(state.is_free());
        assert_eq!(logs(&actions)[0].kind, LogKind::Expired);
    }

    #[test]
    fn control_mapping() {
        assert_eq!(Request::from_control(Control::Start, U1), Request::Acquire(U1));
        assert_eq!(Request::from_control(Control::Release, U1), Request::Release(U1));
        assert_eq!(Request::from_control(Control::Queue, U1), Request::Enqueue(U1));
        assert_eq!(
            Request::from_control(Control::ForceRelease, U1),
            Request::ForceRelease { actor: U1 }
        );
    }
}
