//! Append-only chat log.
//!
//! DESIGN
//! ======
//! Entries are stored in a `Vec` in append order. Ids come from a counter
//! that only moves forward, so id order and insertion order are the same
//! sequence. Nothing exposes `&mut MessageEntry`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[cfg(test)]
#[path = "message_log_test.rs"]
mod tests;

/// Sender used for synthetic connection status entries.
pub const STATUS_SENDER: &str = "WebSocket Connection";
/// Sender used for entries typed by the local user.
pub const USER_SENDER: &str = "User";
/// Sender used for the seeded welcome entry.
pub const SYSTEM_SENDER: &str = "System";

/// Presentation tag for an entry, independent of who sent it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Success,
    Error,
    Warning,
}

/// One immutable unit of the chat log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageEntry {
    pub id: u64,
    pub text: String,
    pub sender: String,
    pub severity: Severity,
    /// Milliseconds since the Unix epoch, stamped at append.
    pub timestamp_ms: i64,
}

/// Ordered store of [`MessageEntry`] values.
#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<MessageEntry>,
    next_id: u64,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_id: 1 }
    }

    /// Append an entry at the tail and return the stored copy.
    pub fn append(&mut self, text: impl Into<String>, sender: impl Into<String>, severity: Severity) -> &MessageEntry {
        let entry = MessageEntry {
            id: self.next_id,
            text: text.into(),
            sender: sender.into(),
            severity,
            timestamp_ms: now_ms(),
        };
        self.next_id += 1;
        let index = self.entries.len();
        self.entries.push(entry);
        &self.entries[index]
    }

    /// Read-only view of every entry appended so far, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> &[MessageEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&MessageEntry> {
        self.entries.last()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}
