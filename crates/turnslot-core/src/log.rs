//! Turn log.
//!
//! Every finished turn and every administrative correction produces an
//! immutable [`LogEntry`]. The [`LogBook`] keeps the entries in memory: in
//! bounded mode only the most recent `n` survive and the whole book is
//! re-rendered into one summary message, newest entry first.

use std::collections::VecDeque;

use crate::ids::{Timestamp, UserId};

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogKind {
    /// The holder released the slot themselves.
    Completed,
    /// Someone cleared the holder with force-release or remove.
    ForcedRelease,
    /// An administrator removed a waiting user from the queue.
    Removed,
    /// The hold timer ran out.
    Expired,
}

/// One immutable log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogEntry {
    /// Who caused the entry
    pub actor: UserId,
    /// Whose turn or queue spot was affected
    pub target: UserId,
    /// What happened
    pub kind: LogKind,
    /// When it happened
    pub at: Timestamp,
}

impl LogEntry {
    /// Single line of log text for this entry.
    pub fn render(&self) -> String {
        let when = format!("<t:{}:f>", self.at.as_secs());
        match self.kind {
            LogKind::Completed => format!("{when} <@{}> finished searching", self.target),
            LogKind::ForcedRelease => {
                format!("{when} <@{}> force-released <@{}>", self.actor, self.target)
            },
            LogKind::Removed => {
                format!("{when} <@{}> removed <@{}> from the queue", self.actor, self.target)
            },
            LogKind::Expired => format!("{when} <@{}> ran out of time", self.target),
        }
    }
}

/// In-memory log, bounded or unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBook {
    retention: Option<usize>,
    entries: VecDeque<LogEntry>,
}

impl LogBook {
    /// Create an empty book. `None` keeps every entry.
    pub fn new(retention: Option<usize>) -> Self {
        Self { retention, entries: VecDeque::new() }
    }

    /// Maximum number of entries kept, if bounded.
    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    /// Append an entry, evicting the oldest ones past the retention limit.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        if let Some(limit) = self.retention {
            while self.entries.len() > limit {
                self.entries.pop_front();
            }
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the book holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Full text of the rolling summary message, newest entry first.
    pub fn render_summary(&self) -> String {
        let mut text = match self.retention {
            Some(limit) => format!("**Turn log** (last {limit}, newest first)"),
            None => "**Turn log** (newest first)".to_string(),
        };
        if self.entries.is_empty() {
            text.push_str("\nNo turns yet.");
        }
        for entry in self.entries.iter().rev() {
            text.push('\n');
            text.push_str(&entry.render());
        }
        text
    }
}
