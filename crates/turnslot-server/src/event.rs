//! Inbound events.
//!
//! Everything the platform tells the coordinator arrives as one
//! [`InboundEvent`] on a single channel.

use turnslot_core::{MessageId, SurfaceId, UserId};

/// A control was pressed on a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    /// Surface the message lives in
    pub surface: SurfaceId,
    /// Message carrying the pressed control
    pub origin: MessageId,
    /// User who pressed it
    pub actor: UserId,
    /// Id of the pressed control
    pub control_id: String,
}

/// Events delivered by a [`crate::Gateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Session established.
    Ready {
        /// The coordinator's own user id on the platform
        self_id: UserId,
    },

    /// A panel control was pressed.
    Action(ActionEvent),

    /// Administrative removal of a user from the slot and queue.
    Remove {
        /// Surface the command was issued in
        surface: SurfaceId,
        /// Administrator
        actor: UserId,
        /// User to remove
        target: UserId,
    },

    /// Someone posted unrelated content to a surface.
    ExternalActivity {
        /// Surface with new content
        surface: SurfaceId,
        /// Author of the new content
        author: UserId,
    },

    /// Stop the coordinator.
    Shutdown,
}
