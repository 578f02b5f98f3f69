//! In-memory message store.
//!
//! Behaves like a chat platform with perfect connectivity: ids are handed
//! out from one increasing counter, deleted messages are gone for good, and
//! sub-surfaces keep their own message lists. Used by the console binary and
//! as the backing store in tests (optionally wrapped in a fault injector).

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use turnslot_core::{Control, MessageId, SurfaceId, UserId};

use crate::{
    error::StoreError,
    event::ActionEvent,
    store::{Message, MessageStore, SubSurface},
};

/// First id handed out by the store.
const FIRST_ID: u64 = 1_000;

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    messages: HashMap<SurfaceId, BTreeMap<MessageId, Message>>,
    sub_surfaces: HashMap<SurfaceId, Vec<SubSurface>>,
    deleted_threads: HashSet<SurfaceId>,
    acknowledged: usize,
}

impl Inner {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn insert(
        &mut self,
        surface: SurfaceId,
        author: UserId,
        content: &str,
        controls: Vec<String>,
    ) -> Message {
        let id = MessageId(self.allocate());
        let message = Message { id, surface, author, content: content.to_string(), controls };
        self.messages.entry(surface).or_default().insert(id, message.clone());
        message
    }
}

/// Message store held entirely in process memory.
#[derive(Debug)]
pub struct MemoryStore {
    self_id: UserId,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store. Messages sent through the [`MessageStore`]
    /// trait are authored by `self_id`.
    pub fn new(self_id: UserId) -> Self {
        Self { self_id, inner: Mutex::new(Inner { next_id: FIRST_ID, ..Inner::default() }) }
    }

    /// The author id used for coordinator messages.
    pub fn self_id(&self) -> UserId {
        self.self_id
    }

    /// Post a message as some other user.
    pub async fn post_as(&self, surface: SurfaceId, author: UserId, content: &str) -> Message {
        self.inner.lock().await.insert(surface, author, content, Vec::new())
    }

    /// Post a message as the coordinator, bypassing any wrapper.
    ///
    /// Simulates leftovers from a previous process.
    pub async fn post_panel_copy(&self, surface: SurfaceId, content: &str) -> Message {
        self.inner.lock().await.insert(surface, self.self_id, content, Control::all_ids())
    }

    /// Delete a message behind the coordinator's back.
    pub async fn purge(&self, surface: SurfaceId, id: MessageId) -> bool {
        self.inner
            .lock()
            .await
            .messages
            .get_mut(&surface)
            .is_some_and(|messages| messages.remove(&id).is_some())
    }

    /// All messages on a surface, oldest first.
    pub async fn messages(&self, surface: SurfaceId) -> Vec<Message> {
        self.inner
            .lock()
            .await
            .messages
            .get(&surface)
            .map(|messages| messages.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Panels rendered by the coordinator on a surface, oldest first.
    pub async fn panels(&self, surface: SurfaceId) -> Vec<Message> {
        self.messages(surface)
            .await
            .into_iter()
            .filter(|message| message.is_panel_of(self.self_id))
            .collect()
    }

    /// Newest message on a surface that carries controls.
    pub async fn latest_with_controls(&self, surface: SurfaceId) -> Option<Message> {
        self.messages(surface).await.into_iter().rev().find(|message| !message.controls.is_empty())
    }

    /// Sub-surfaces created under `parent`.
    pub async fn sub_surfaces(&self, parent: SurfaceId) -> Vec<SubSurface> {
        self.inner.lock().await.sub_surfaces.get(&parent).cloned().unwrap_or_default()
    }

    /// Mark a sub-surface archived.
    pub async fn archive(&self, parent: SurfaceId, thread: SurfaceId) {
        if let Some(threads) = self.inner.lock().await.sub_surfaces.get_mut(&parent) {
            for sub in threads.iter_mut().filter(|sub| sub.id == thread) {
                sub.archived = true;
            }
        }
    }

    /// Delete a sub-surface and everything in it.
    pub async fn delete_sub_surface(&self, parent: SurfaceId, thread: SurfaceId) {
        let mut inner = self.inner.lock().await;
        if let Some(threads) = inner.sub_surfaces.get_mut(&parent) {
            threads.retain(|sub| sub.id != thread);
        }
        inner.messages.remove(&thread);
        inner.deleted_threads.insert(thread);
    }

    /// Number of control presses acknowledged without an edit.
    pub async fn acknowledged(&self) -> usize {
        self.inner.lock().await.acknowledged
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_message(
        &self,
        surface: SurfaceId,
        id: MessageId,
    ) -> Result<Message, StoreError> {
        self.inner
            .lock()
            .await
            .messages
            .get(&surface)
            .and_then(|messages| messages.get(&id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn send_message(
        &self,
        surface: SurfaceId,
        content: &str,
        controls: &[Control],
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.deleted_threads.contains(&surface) {
            return Err(StoreError::NotFound);
        }

        let ids = controls.iter().map(|control| control.id().to_string()).collect();
        Ok(inner.insert(surface, self.self_id, content, ids))
    }

    async fn edit_message(
        &self,
        surface: SurfaceId,
        id: MessageId,
        content: &str,
        controls: &[Control],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let message = inner
            .messages
            .get_mut(&surface)
            .and_then(|messages| messages.get_mut(&id))
            .ok_or(StoreError::NotFound)?;

        if message.author != self.self_id {
            return Err(StoreError::Forbidden);
        }

        message.content = content.to_string();
        message.controls = controls.iter().map(|control| control.id().to_string()).collect();
        Ok(())
    }

    async fn delete_message(&self, surface: SurfaceId, id: MessageId) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .messages
            .get_mut(&surface)
            .and_then(|messages| messages.remove(&id))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn recent_messages(
        &self,
        surface: SurfaceId,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .messages
            .get(&surface)
            .map(|messages| messages.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_sub_surface(
        &self,
        parent: SurfaceId,
        name: &str,
    ) -> Result<SubSurface, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = SurfaceId(inner.allocate());
        let sub = SubSurface { id, parent, name: name.to_string(), archived: false };
        inner.sub_surfaces.entry(parent).or_default().push(sub.clone());
        inner.messages.entry(id).or_default();
        Ok(sub)
    }

    async fn list_sub_surfaces(&self, parent: SurfaceId) -> Result<Vec<SubSurface>, StoreError> {
        Ok(self.sub_surfaces(parent).await)
    }

    async fn acknowledge(&self, _event: &ActionEvent) -> Result<(), StoreError> {
        self.inner.lock().await.acknowledged += 1;
        Ok(())
    }
}
