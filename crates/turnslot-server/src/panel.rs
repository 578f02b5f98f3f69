//! Panel reconciliation.
//!
//! Keeps exactly one live panel message per surface, showing the latest
//! rendered state. The remote store gives no transactional guarantees, so
//! every path here is idempotent and self-healing:
//!
//! - An edit that is impossible (message gone, permissions changed) falls
//!   back to posting a fresh panel
//! - Old panels that could not be deleted are remembered and retried
//! - A deduplication pass removes stray panels left by restarts or races
//!
//! No failure is ever propagated. A failed call leaves the panel stale until
//! the next reconciliation, which is logged.

use tracing::{debug, info, warn};
use turnslot_core::{Control, MessageId, SurfaceId, UserId};

use crate::{error::StoreError, store::MessageStore};

/// Outcome of one reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    /// The existing panel was edited in place.
    Edited,
    /// A new panel message was posted.
    Created,
    /// The remote side could not be updated this time.
    Stale,
}

/// Tracks the panel message of one surface.
#[derive(Debug, Clone)]
pub struct PanelReconciler {
    surface: SurfaceId,
    message_id: Option<MessageId>,
    self_id: Option<UserId>,
    dedup_window: usize,
    /// Superseded panels whose deletion failed
    orphans: Vec<MessageId>,
}

impl PanelReconciler {
    /// Create a reconciler with no known panel.
    pub fn new(surface: SurfaceId, dedup_window: usize) -> Self {
        Self { surface, message_id: None, self_id: None, dedup_window, orphans: Vec::new() }
    }

    /// Surface this reconciler manages.
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Currently tracked panel message.
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    /// Superseded panels still waiting to be deleted.
    pub fn pending_deletions(&self) -> usize {
        self.orphans.len()
    }

    /// Record the coordinator's own user id, needed to recognise panels.
    pub fn set_self_id(&mut self, self_id: UserId) {
        self.self_id = Some(self_id);
    }

    /// Make sure a panel exists and shows `content`.
    ///
    /// Edits the tracked panel if it still exists, otherwise posts a new one.
    pub async fn ensure_exists<S>(&mut self, store: &S, content: &str) -> PanelStatus
    where
        S: MessageStore + ?Sized,
    {
        self.retry_orphans(store).await;

        let Some(id) = self.message_id else {
            return self.push_fresh(store, content).await;
        };

        match store.fetch_message(self.surface, id).await {
            Ok(_) => self.edit_tracked(store, id, content).await,
            Err(err) if err.is_stale() => {
                debug!(surface = %self.surface, message = %id, "panel gone, recreating");
                self.push_fresh(store, content).await
            },
            Err(err) => {
                warn!(surface = %self.surface, message = %id, error = %err, "panel fetch failed");
                PanelStatus::Stale
            },
        }
    }

    /// Replace the panel with a freshly posted one at the bottom of the
    /// surface.
    ///
    /// Deletion of the previous panel is best effort; a failed deletion is
    /// retried on later calls.
    pub async fn push_fresh<S>(&mut self, store: &S, content: &str) -> PanelStatus
    where
        S: MessageStore + ?Sized,
    {
        if let Some(old) = self.message_id.take() {
            self.delete_or_remember(store, old).await;
        }

        match store.send_message(self.surface, content, &Control::ALL).await {
            Ok(message) => {
                debug!(surface = %self.surface, message = %message.id, "panel posted");
                self.message_id = Some(message.id);
                PanelStatus::Created
            },
            Err(err) => {
                warn!(surface = %self.surface, error = %err, "posting panel failed");
                PanelStatus::Stale
            },
        }
    }

    /// Fast path when answering a control press on `origin`.
    ///
    /// The pressed message becomes the tracked panel. If a different panel
    /// was tracked, it is deleted so only one stays live. If the origin
    /// cannot be edited, a fresh panel is posted instead.
    pub async fn edit_in_place<S>(
        &mut self,
        store: &S,
        origin: MessageId,
        content: &str,
    ) -> PanelStatus
    where
        S: MessageStore + ?Sized,
    {
        if let Some(previous) = self.message_id.filter(|&id| id != origin) {
            debug!(surface = %self.surface, previous = %previous, origin = %origin, "adopting pressed panel");
            self.delete_or_remember(store, previous).await;
        }
        self.adopt(origin);
        self.retry_orphans(store).await;

        self.edit_tracked(store, origin, content).await
    }

    /// Remove duplicate panels among the most recent messages.
    ///
    /// Keeps the newest panel rendered by this coordinator, deletes the rest,
    /// and adopts the survivor. Returns the number of duplicates deleted.
    pub async fn deduplicate<S>(&mut self, store: &S) -> usize
    where
        S: MessageStore + ?Sized,
    {
        let Some(self_id) = self.self_id else {
            debug!(surface = %self.surface, "own id unknown, skipping panel cleanup");
            return 0;
        };

        let recent = match store.recent_messages(self.surface, self.dedup_window).await {
            Ok(recent) => recent,
            Err(err) => {
                warn!(surface = %self.surface, error = %err, "listing messages failed");
                return 0;
            },
        };

        let mut panels: Vec<MessageId> = recent
            .iter()
            .filter(|message| message.is_panel_of(self_id))
            .map(|message| message.id)
            .collect();
        panels.sort_unstable();

        let Some(newest) = panels.pop() else {
            return 0;
        };

        let mut deleted = 0;
        for &duplicate in &panels {
            match store.delete_message(self.surface, duplicate).await {
                Ok(()) | Err(StoreError::NotFound) => deleted += 1,
                Err(err) => {
                    warn!(surface = %self.surface, message = %duplicate, error = %err, "deleting duplicate panel failed");
                    self.orphans.push(duplicate);
                },
            }
        }

        // A tracked panel outside the scan window is older than the survivor.
        if let Some(tracked) =
            self.message_id.filter(|tracked| *tracked != newest && !panels.contains(tracked))
        {
            self.delete_or_remember(store, tracked).await;
        }
        self.adopt(newest);

        if deleted > 0 {
            info!(surface = %self.surface, deleted, "removed duplicate panels");
        }
        deleted
    }

    fn adopt(&mut self, id: MessageId) {
        self.message_id = Some(id);
        self.orphans.retain(|&orphan| orphan != id);
    }

    async fn edit_tracked<S>(&mut self, store: &S, id: MessageId, content: &str) -> PanelStatus
    where
        S: MessageStore + ?Sized,
    {
        match store.edit_message(self.surface, id, content, &Control::ALL).await {
            Ok(()) => PanelStatus::Edited,
            Err(err) if err.is_stale() => {
                debug!(surface = %self.surface, message = %id, error = %err, "panel not editable, recreating");
                self.push_fresh(store, content).await
            },
            Err(err) => {
                warn!(surface = %self.surface, message = %id, error = %err, "panel edit failed");
                PanelStatus::Stale
            },
        }
    }

    async fn delete_or_remember<S>(&mut self, store: &S, id: MessageId)
    where
        S: MessageStore + ?Sized,
    {
        match store.delete_message(self.surface, id).await {
            Ok(()) | Err(StoreError::NotFound) => {},
            Err(err) => {
                debug!(surface = %self.surface, message = %id, error = %err, "old panel not deleted");
                if !self.orphans.contains(&id) {
                    self.orphans.push(id);
                }
            },
        }
    }

    async fn retry_orphans<S>(&mut self, store: &S)
    where
        S: MessageStore + ?Sized,
    {
        let tracked = self.message_id;
        let pending = std::mem::take(&mut self.orphans);
        for id in pending.into_iter().filter(|&id| Some(id) != tracked) {
            match store.delete_message(self.surface, id).await {
                Ok(()) | Err(StoreError::NotFound) | Err(StoreError::Forbidden) => {},
                Err(_) => self.orphans.push(id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    const ME: UserId = UserId(7);
    const CHANNEL: SurfaceId = SurfaceId(1);
    const PANEL: &str = "Searching: nobody\n\nQueue: empty";

    fn reconciler() -> PanelReconciler {
        let mut panel = PanelReconciler::new(CHANNEL, 50);
        panel.set_self_id(ME);
        panel
    }

    #[tokio::test]
    async fn ensure_exists_creates_then_edits() {
        let store = MemoryStore::new(ME);
        let mut panel = reconciler();

        assert_eq!(panel.ensure_exists(&store, PANEL).await, PanelStatus::Created);
        let first = panel.message_id();

        assert_eq!(panel.ensure_exists(&store, "Searching: <@1>\n\nQueue: empty").await, PanelStatus::Edited);
        assert_eq!(panel.message_id(), first);

        let panels = store.panels(CHANNEL).await;
        assert_eq!(panels.len(), 1);
        assert!(panels[0].content.starts_with("Searching: <@1>"));
    }

    #[tokio::test]
    async fn ensure_exists_recreates_deleted_panel() {
        let store = MemoryStore::new(ME);
        let mut panel = reconciler();
        panel.ensure_exists(&store, PANEL).await;
        let old = panel.message_id().unwrap();

        store.purge(CHANNEL, old).await;

        assert_eq!(panel.ensure_exists(&store, PANEL).await, PanelStatus::Created);
        assert_ne!(panel.message_id(), Some(old));
        assert_eq!(store.panels(CHANNEL).await.len(), 1);
    }

    #[tokio::test]
    async fn push_fresh_moves_panel_to_bottom() {
        let store = MemoryStore::new(ME);
        let mut panel = reconciler();
        panel.ensure_exists(&store, PANEL).await;
        let chatter = store.post_as(CHANNEL, UserId(2), "anyone searching?").await;

        assert_eq!(panel.push_fresh(&store, PANEL).await, PanelStatus::Created);

        let messages = store.messages(CHANNEL).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, chatter.id);
        assert_eq!(Some(messages[1].id), panel.message_id());
    }

    #[tokio::test]
    async fn edit_in_place_adopts_origin() {
        let store = MemoryStore::new(ME);
        let mut panel = reconciler();
        panel.ensure_exists(&store, PANEL).await;
        let stray = store.post_panel_copy(CHANNEL, PANEL).await;

        let status = panel.edit_in_place(&store, stray.id, "Searching: <@3>\n\nQueue: empty").await;

        assert_eq!(status, PanelStatus::Edited);
        assert_eq!(panel.message_id(), Some(stray.id));
        let panels = store.panels(CHANNEL).await;
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].id, stray.id);
    }

    #[tokio::test]
    async fn edit_in_place_falls_back_when_origin_vanished() {
        let store = MemoryStore::new(ME);
        let mut panel = reconciler();
        panel.ensure_exists(&store, PANEL).await;
        let origin = panel.message_id().unwrap();
        store.purge(CHANNEL, origin).await;

        assert_eq!(panel.edit_in_place(&store, origin, PANEL).await, PanelStatus::Created);
        assert_eq!(store.panels(CHANNEL).await.len(), 1);
    }

    #[tokio::test]
    async fn deduplicate_keeps_newest() {
        let store = MemoryStore::new(ME);
        store.post_panel_copy(CHANNEL, PANEL).await;
        store.post_as(CHANNEL, UserId(2), "Searching: my keys\n\nQueue: none").await;
        store.post_panel_copy(CHANNEL, PANEL).await;
        let newest = store.post_panel_copy(CHANNEL, PANEL).await;

        let mut panel = reconciler();
        assert_eq!(panel.deduplicate(&store).await, 2);
        assert_eq!(panel.message_id(), Some(newest.id));

        let remaining = store.messages(CHANNEL).await;
        assert_eq!(remaining.len(), 2);
        assert_eq!(store.panels(CHANNEL).await.len(), 1);
    }

    #[tokio::test]
    async fn deduplicate_needs_own_id() {
        let store = MemoryStore::new(ME);
        store.post_panel_copy(CHANNEL, PANEL).await;
        store.post_panel_copy(CHANNEL, PANEL).await;

        let mut panel = PanelReconciler::new(CHANNEL, 50);
        assert_eq!(panel.deduplicate(&store).await, 0);
        assert_eq!(store.panels(CHANNEL).await.len(), 2);
    }
}
