//! Remote message store abstraction.
//!
//! The chat platform is modelled as a store of messages grouped by surface,
//! plus sub-surfaces (threads) nested under a parent surface. Every call may
//! fail; callers treat failures as "try again later" and never crash.
//!
//! Production plugs in a platform client, the console driver and tests use
//! [`crate::MemoryStore`].

use async_trait::async_trait;
use turnslot_core::{Control, MessageId, SurfaceId, UserId, render::has_panel_markers};

use crate::{error::StoreError, event::ActionEvent};

/// A message as seen on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message id (later messages have larger ids)
    pub id: MessageId,
    /// Surface the message lives in
    pub surface: SurfaceId,
    /// Author of the message
    pub author: UserId,
    /// Text content
    pub content: String,
    /// Ids of the interactive controls attached to the message
    pub controls: Vec<String>,
}

impl Message {
    /// Whether this message looks like a panel rendered by `self_id`.
    ///
    /// A panel is authored by the coordinator, carries both panel markers,
    /// and has all four controls attached.
    pub fn is_panel_of(&self, self_id: UserId) -> bool {
        self.author == self_id
            && has_panel_markers(&self.content)
            && Control::ALL.iter().all(|control| self.controls.iter().any(|id| id == control.id()))
    }
}

/// A thread-like sub-surface nested under a parent surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubSurface {
    /// Surface id of the thread itself
    pub id: SurfaceId,
    /// Parent surface
    pub parent: SurfaceId,
    /// Thread name
    pub name: String,
    /// Archived threads are hidden but still usable
    pub archived: bool,
}

/// Operations the coordinator needs from the chat platform.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Fetch a message by id.
    ///
    /// Returns `StoreError::NotFound` if the message was deleted.
    async fn fetch_message(&self, surface: SurfaceId, id: MessageId)
    -> Result<Message, StoreError>;

    /// Post a new message with the given controls attached.
    async fn send_message(
        &self,
        surface: SurfaceId,
        content: &str,
        controls: &[Control],
    ) -> Result<Message, StoreError>;

    /// Replace the content and controls of an existing message.
    async fn edit_message(
        &self,
        surface: SurfaceId,
        id: MessageId,
        content: &str,
        controls: &[Control],
    ) -> Result<(), StoreError>;

    /// Delete a message.
    async fn delete_message(&self, surface: SurfaceId, id: MessageId) -> Result<(), StoreError>;

    /// The most recent `limit` messages of a surface, newest first.
    async fn recent_messages(
        &self,
        surface: SurfaceId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Create a named sub-surface under `parent`.
    async fn create_sub_surface(
        &self,
        parent: SurfaceId,
        name: &str,
    ) -> Result<SubSurface, StoreError>;

    /// All sub-surfaces of `parent`, active and archived.
    async fn list_sub_surfaces(&self, parent: SurfaceId) -> Result<Vec<SubSurface>, StoreError>;

    /// Acknowledge a control press that caused no visible change.
    async fn acknowledge(&self, event: &ActionEvent) -> Result<(), StoreError>;
}
