//! The local message log: the short-term conversational memory window.
//!
//! The log holds the most recent (user, assistant) turns, bounded to a fixed
//! number of pairs. The backend owns durable history; this window is what
//! the client displays and keeps in memory between turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry in the conversation.
///
/// Identity is assigned at creation and never reused. Content is mutable
/// only while the entry is the open assistant message of an in-flight turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Ordered, bounded sequence of messages.
///
/// Invariant: never holds more than `2 * max_pairs` entries. Overflow evicts
/// whole (user, assistant) pairs from the front, preserving alternation.
#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<Message>,
    max_pairs: usize,
}

impl MessageLog {
    pub fn new(max_pairs: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_pairs,
        }
    }

    /// Appends a message, assigning a fresh id and timestamp, then enforces
    /// the window bound. Returns the assigned id.
    ///
    /// Trimming is a post-condition of every append, not a periodic sweep.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.entries.push(Message {
            id: id.clone(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
        self.trim();
        id
    }

    /// Drops oldest pairs until the log fits the window again.
    fn trim(&mut self) {
        let cap = self.max_pairs * 2;
        while self.entries.len() > cap {
            let drop = 2.min(self.entries.len());
            self.entries.drain(..drop);
        }
    }

    /// Resolves a message's content by id for in-place mutation.
    ///
    /// Lookup is by identity, not index: a trim during a streaming turn can
    /// shift positions, or evict the entry entirely (returns `None`).
    pub fn content_mut(&mut self, id: &str) -> Option<&mut String> {
        self.entries
            .iter_mut()
            .find(|m| m.id == id)
            .map(|m| &mut m.content)
    }

    /// Replaces the whole log with `(role, content)` pairs from the backend
    /// transcript, then re-applies the window bound.
    pub fn replace_all<I>(&mut self, history: I)
    where
        I: IntoIterator<Item = (Role, String)>,
    {
        self.entries = history
            .into_iter()
            .map(|(role, content)| Message {
                id: uuid::Uuid::new_v4().to_string(),
                role,
                content,
                created_at: Utc::now(),
            })
            .collect();
        self.trim();
    }

    /// Replaces the whole log with previously snapshotted entries, keeping
    /// their ids and timestamps, then re-applies the window bound.
    pub fn restore(&mut self, entries: Vec<Message>) {
        self.entries = entries;
        self.trim();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_turns(log: &mut MessageLog, turns: usize) {
        for i in 0..turns {
            log.push(Role::User, format!("question {i}"));
            log.push(Role::Assistant, format!("answer {i}"));
        }
    }

    #[test]
    fn test_push_assigns_unique_ids() {
        let mut log = MessageLog::new(4);
        let a = log.push(Role::User, "hi");
        let b = log.push(Role::Assistant, "hello");
        assert_ne!(a, b);
    }

    #[test]
    fn test_log_never_exceeds_window() {
        let mut log = MessageLog::new(3);
        fill_turns(&mut log, 10);
        assert_eq!(log.len(), 6);
    }

    #[test]
    fn test_overflow_evicts_oldest_pair_first() {
        let mut log = MessageLog::new(2);
        fill_turns(&mut log, 3);

        let contents: Vec<&str> = log.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["question 1", "answer 1", "question 2", "answer 2"]
        );
        // Alternation preserved: front is a user message
        assert_eq!(log.messages()[0].role, Role::User);
    }

    #[test]
    fn test_content_mut_resolves_by_id_after_trim() {
        let mut log = MessageLog::new(2);
        fill_turns(&mut log, 1);
        log.push(Role::User, "q");
        let open = log.push(Role::Assistant, "");

        // Force an eviction while the assistant entry is open
        log.push(Role::User, "later");
        log.push(Role::Assistant, "later answer");

        let content = log.content_mut(&open).expect("entry still in window");
        content.push_str("streamed");
        assert!(log.messages().iter().any(|m| m.content == "streamed"));
    }

    #[test]
    fn test_content_mut_missing_after_eviction() {
        let mut log = MessageLog::new(1);
        let old = log.push(Role::User, "q0");
        log.push(Role::Assistant, "a0");
        fill_turns(&mut log, 2);

        assert!(log.content_mut(&old).is_none());
    }

    #[test]
    fn test_replace_all_applies_window() {
        let mut log = MessageLog::new(2);
        let history = (0..6).map(|i| {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            (role, format!("m{i}"))
        });
        log.replace_all(history);

        assert_eq!(log.len(), 4);
        assert_eq!(log.messages()[0].content, "m2");
    }

    #[test]
    fn test_restore_keeps_identity_and_applies_window() {
        let mut log = MessageLog::new(1);
        fill_turns(&mut log, 2);
        let saved: Vec<Message> = log.messages().to_vec();

        let mut fresh = MessageLog::new(1);
        fresh.restore(saved.clone());

        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.messages()[0].id, saved[0].id);
        assert_eq!(fresh.messages()[0].content, "question 1");
    }

    #[test]
    fn test_clear_empties_log() {
        let mut log = MessageLog::new(2);
        fill_turns(&mut log, 2);
        log.clear();
        assert!(log.is_empty());
    }
}
