//! Reference model of one surface.
//!
//! The model is intentionally simple: a holder, a plain vector for the
//! queue, and a list of logged turns. It knows nothing about messages,
//! locks, or timestamps. Model-based tests run the same operation sequence
//! through the model and through the real coordinator and compare the
//! observable state.

use turnslot_core::{Control, HandoverPolicy, LogKind, UserId};

/// One step of a generated scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `user` presses `control` on the panel.
    Press {
        /// Pressing user
        user: u8,
        /// Control pressed
        control: Control,
    },
    /// Administrative removal of `target` by `actor`.
    Remove {
        /// User to remove
        target: u8,
        /// Administrator
        actor: u8,
    },
    /// `user` posts something unrelated on the surface.
    Chatter {
        /// Author
        user: u8,
    },
}

/// Expected turn state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSlot {
    /// Current holder
    pub holder: Option<UserId>,
    /// Waiting users, front first
    pub queue: Vec<UserId>,
    /// Logged turns as (kind, target), oldest first
    pub log: Vec<(LogKind, UserId)>,
}

impl ModelSlot {
    /// Free slot, empty queue, empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: Operation, handover: HandoverPolicy) {
        match op {
            Operation::Press { user, control } => {
                let user = UserId(u64::from(user));
                match control {
                    Control::Start => self.start(user),
                    Control::Release => {
                        if self.holder == Some(user) {
                            self.log.push((LogKind::Completed, user));
                            self.free(handover);
                        }
                    },
                    Control::Queue => {
                        if self.holder != Some(user) && !self.queue.contains(&user) {
                            self.queue.push(user);
                        }
                    },
                    Control::ForceRelease => {
                        if let Some(holder) = self.holder {
                            self.log.push((LogKind::ForcedRelease, holder));
                            self.free(handover);
                        }
                    },
                }
            },
            Operation::Remove { target, .. } => {
                let target = UserId(u64::from(target));
                if let Some(index) = self.queue.iter().position(|&u| u == target) {
                    self.queue.remove(index);
                    self.log.push((LogKind::Removed, target));
                }
                if self.holder == Some(target) {
                    self.log.push((LogKind::ForcedRelease, target));
                    self.free(handover);
                }
            },
            Operation::Chatter { .. } => {},
        }
    }

    fn start(&mut self, user: UserId) {
        match self.holder {
            None => {
                self.queue.retain(|&u| u != user);
                self.holder = Some(user);
            },
            Some(holder) if holder == user => {},
            Some(_) => {
                if !self.queue.contains(&user) {
                    self.queue.push(user);
                }
            },
        }
    }

    fn free(&mut self, handover: HandoverPolicy) {
        self.holder = None;
        if handover == HandoverPolicy::AutoAdvance && !self.queue.is_empty() {
            self.holder = Some(self.queue.remove(0));
        }
    }
}
