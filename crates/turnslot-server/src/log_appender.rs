//! Turn log appender.
//!
//! Writes [`LogEntry`] records into a named sub-surface under the panel
//! surface. In bounded mode a single summary message is rewritten on every
//! append (newest entry first); in unbounded mode every entry becomes its
//! own message and earlier messages are never touched.
//!
//! A failed write is never dropped. Bounded mode marks the summary stale and
//! rewrites it on the next append or flush; unbounded mode keeps the entry
//! queued and posts the backlog in order before anything newer.
//!
//! # Discovery
//!
//! The log sub-surface is found by name: the cached id first, then active
//! sub-surfaces, then archived ones. Only if none matches is a new one
//! created, so repeated discovery never creates a second sub-surface.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use turnslot_core::{LogBook, LogEntry, MessageId, SurfaceId};

use crate::{
    error::StoreError,
    store::{Message, MessageStore},
};

/// Appends log entries to the log sub-surface of one surface.
#[derive(Debug, Clone)]
pub struct LogAppender {
    parent: SurfaceId,
    name: String,
    enabled: bool,
    thread: Option<SurfaceId>,
    summary: Option<MessageId>,
    /// Bounded mode: the remote summary lags the book
    summary_stale: bool,
    /// Unbounded mode: entries not yet posted, oldest first
    pending: VecDeque<LogEntry>,
    book: LogBook,
}

impl LogAppender {
    /// Create an appender for the sub-surface `name` under `parent`.
    ///
    /// # Arguments
    /// * `parent` - Panel surface
    /// * `name` - Sub-surface name
    /// * `retention` - `Some(n)` for a bounded summary, `None` for one
    ///   message per entry
    /// * `enabled` - When false, entries are kept in memory only
    pub fn new(parent: SurfaceId, name: impl Into<String>, retention: Option<usize>, enabled: bool) -> Self {
        Self {
            parent,
            name: name.into(),
            enabled,
            thread: None,
            summary: None,
            summary_stale: false,
            pending: VecDeque::new(),
            book: LogBook::new(retention),
        }
    }

    /// Sub-surface currently used for the log.
    pub fn thread(&self) -> Option<SurfaceId> {
        self.thread
    }

    /// Entries recorded since startup (bounded mode keeps only the tail).
    pub fn book(&self) -> &LogBook {
        &self.book
    }

    /// Entries recorded but not yet written to the log sub-surface.
    pub fn backlog(&self) -> usize {
        match self.book.retention() {
            Some(_) => usize::from(self.summary_stale),
            None => self.pending.len(),
        }
    }

    /// Find or create the log sub-surface.
    ///
    /// Returns `None` if the store could not be reached.
    pub async fn discover<S>(&mut self, store: &S) -> Option<SurfaceId>
    where
        S: MessageStore + ?Sized,
    {
        if !self.enabled {
            return None;
        }
        if let Some(thread) = self.thread {
            return Some(thread);
        }

        let existing = match store.list_sub_surfaces(self.parent).await {
            Ok(existing) => existing,
            Err(err) => {
                warn!(surface = %self.parent, error = %err, "listing log threads failed");
                return None;
            },
        };

        // Active threads sort before archived ones.
        let found = existing
            .iter()
            .filter(|sub| sub.name == self.name)
            .min_by_key(|sub| sub.archived)
            .map(|sub| (sub.id, sub.archived));
        if let Some((id, archived)) = found {
            debug!(surface = %self.parent, thread = %id, archived, "reusing log thread");
            self.thread = Some(id);
            return self.thread;
        }

        match store.create_sub_surface(self.parent, &self.name).await {
            Ok(created) => {
                info!(surface = %self.parent, thread = %created.id, "created log thread");
                self.thread = Some(created.id);
                self.thread
            },
            Err(err) => {
                warn!(surface = %self.parent, error = %err, "creating log thread failed");
                None
            },
        }
    }

    /// Record `entry` and write it to the log sub-surface.
    ///
    /// The entry is kept even if the write fails and goes out with the next
    /// successful append or [`flush`](Self::flush).
    pub async fn append<S>(&mut self, store: &S, entry: LogEntry)
    where
        S: MessageStore + ?Sized,
    {
        self.book.push(entry);
        if !self.enabled {
            return;
        }

        if self.book.retention().is_some() {
            self.summary_stale = true;
        } else {
            self.pending.push_back(entry);
        }
        self.flush(store).await;
    }

    /// Write whatever earlier appends could not.
    pub async fn flush<S>(&mut self, store: &S)
    where
        S: MessageStore + ?Sized,
    {
        if !self.enabled {
            return;
        }

        if self.book.retention().is_some() {
            if self.summary_stale {
                self.summary_stale = !self.write_summary(store).await;
            }
            return;
        }

        while let Some(entry) = self.pending.front() {
            let line = entry.render();
            if let Err(err) = self.post(store, &line).await {
                warn!(surface = %self.parent, error = %err, backlog = self.pending.len(), "log entry not posted");
                return;
            }
            self.pending.pop_front();
        }
    }

    /// Rewrite the summary. Returns whether the remote side is current.
    async fn write_summary<S>(&mut self, store: &S) -> bool
    where
        S: MessageStore + ?Sized,
    {
        let text = self.book.render_summary();

        if let (Some(thread), Some(summary)) = (self.thread, self.summary) {
            match store.edit_message(thread, summary, &text, &[]).await {
                Ok(()) => return true,
                Err(err) if err.is_stale() => {
                    debug!(surface = %self.parent, message = %summary, "log summary gone, reposting");
                    self.summary = None;
                },
                Err(err) => {
                    warn!(surface = %self.parent, error = %err, "log summary edit failed");
                    return false;
                },
            }
        }

        match self.post(store, &text).await {
            Ok(message) => {
                self.summary = Some(message.id);
                true
            },
            Err(err) => {
                warn!(surface = %self.parent, error = %err, "log summary not posted");
                false
            },
        }
    }

    /// Post to the log sub-surface, rediscovering it once if it vanished.
    async fn post<S>(&mut self, store: &S, text: &str) -> Result<Message, StoreError>
    where
        S: MessageStore + ?Sized,
    {
        let thread = self.discover(store).await.ok_or(StoreError::NotFound)?;
        match store.send_message(thread, text, &[]).await {
            Err(StoreError::NotFound) => {
                debug!(surface = %self.parent, thread = %thread, "log thread gone, rediscovering");
                self.thread = None;
                self.summary = None;
                let thread = self.discover(store).await.ok_or(StoreError::NotFound)?;
                store.send_message(thread, text, &[]).await
            },
            other => other,
        }
    }
}
