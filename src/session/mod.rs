//! Conversation history for the advisor chat.
//!
//! The [`ConversationStore`] owns the ordered message list and writes the
//! complete history to a [`KeyValueStore`] after every mutation, so a crash
//! never leaves a partial value behind.
//!
//! ## Storage Format
//!
//! One value under the `chat_history` key:
//!
//! ```json
//! {"version": 1, "messages": [{"role": "user", "content": "..."}, ...]}
//! ```
//!
//! A bare array of `{role, content}` objects (the format written by the web
//! client) is accepted on restore and rewritten as an envelope on the next
//! mutation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{KeyValueStore, KvError};

/// Key the history is stored under.
pub const HISTORY_KEY: &str = "chat_history";

/// Current envelope version.
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// Error type for history persistence.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported history format version: {0}")]
    UnsupportedVersion(u32),
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Position in the conversation, starting at 0.
    pub sequence: u64,
}

impl Message {
    /// Wire and storage form (no sequence number).
    pub fn to_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// `{role, content}` pair as sent to the advisor and stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryEnvelope {
    version: u32,
    messages: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredHistory {
    Versioned(HistoryEnvelope),
    Legacy(Vec<HistoryEntry>),
}

/// Serialize a full history into its stored form.
pub fn encode_history(messages: &[Message]) -> Result<String, SessionError> {
    let envelope = HistoryEnvelope {
        version: HISTORY_FORMAT_VERSION,
        messages: messages.iter().map(Message::to_entry).collect(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a stored history; sequence numbers are derived from position.
pub fn decode_history(raw: &str) -> Result<Vec<Message>, SessionError> {
    let entries = match serde_json::from_str::<StoredHistory>(raw)? {
        StoredHistory::Versioned(envelope) => {
            if envelope.version != HISTORY_FORMAT_VERSION {
                return Err(SessionError::UnsupportedVersion(envelope.version));
            }
            envelope.messages
        }
        StoredHistory::Legacy(entries) => entries,
    };

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| Message {
            role: entry.role,
            content: entry.content,
            sequence: idx as u64,
        })
        .collect())
}

/// Ordered conversation history with write-through persistence.
pub struct ConversationStore {
    messages: Vec<Message>,
    kv: Box<dyn KeyValueStore>,
    key: String,
}

impl ConversationStore {
    /// Load the history stored under [`HISTORY_KEY`].
    pub fn restore(kv: Box<dyn KeyValueStore>) -> Self {
        Self::restore_with_key(kv, HISTORY_KEY)
    }

    /// Load the history stored under `key`.
    ///
    /// A missing, unreadable or malformed value yields an empty history.
    pub fn restore_with_key(kv: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let messages = match kv.get(&key) {
            Ok(Some(raw)) => match decode_history(&raw) {
                Ok(messages) => {
                    tracing::debug!(key = %key, count = messages.len(), "Restored chat history");
                    messages
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding malformed chat history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read chat history");
                Vec::new()
            }
        };

        Self { messages, kv, key }
    }

    /// Append a message and persist the full history.
    ///
    /// Persistence failures are logged; the in-memory history is still
    /// updated.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let sequence = self.messages.len() as u64;
        self.messages.push(Message {
            role,
            content: content.into(),
            sequence,
        });

        if let Err(e) = self.persist() {
            tracing::warn!(key = %self.key, error = %e, "Failed to persist chat history");
        }

        &self.messages[self.messages.len() - 1]
    }

    /// The last `n` messages, oldest first.
    pub fn windowed(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Drop all messages and erase the persisted copy.
    pub fn clear(&mut self) {
        self.messages.clear();
        if let Err(e) = self.kv.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "Failed to erase chat history");
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn persist(&self) -> Result<(), SessionError> {
        let raw = encode_history(&self.messages)?;
        self.kv.set(&self.key, &raw)?;
        Ok(())
    }
}

impl fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationStore")
            .field("key", &self.key)
            .field("messages", &self.messages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, MemoryKvStore};
    use tempfile::TempDir;

    // =========================================================================
    // Test Helpers
    // =========================================================================

    /// Store whose writes always fail.
    struct FailingKvStore;

    impl KeyValueStore for FailingKvStore {
        fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
            Err(KvError::Unavailable("offline".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), KvError> {
            Err(KvError::Unavailable("offline".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), KvError> {
            Err(KvError::Unavailable("offline".to_string()))
        }
    }

    fn store_with(count: usize) -> ConversationStore {
        let mut store = ConversationStore::restore(Box::new(MemoryKvStore::new()));
        for i in 0..count {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            store.append(role, format!("m{}", i));
        }
        store
    }

    // =========================================================================
    // Append & window
    // =========================================================================

    #[test]
    fn test_append_assigns_sequence() {
        let mut store = store_with(0);
        assert_eq!(store.append(Role::User, "hi").sequence, 0);
        assert_eq!(store.append(Role::Assistant, "hello").sequence, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.last().unwrap().content, "hello");
    }

    #[test]
    fn test_windowed_with_fewer_messages_than_window() {
        let store = store_with(3);
        let window = store.windowed(10);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "m0");
    }

    #[test]
    fn test_windowed_returns_last_n_in_order() {
        let store = store_with(20);
        let window = store.windowed(10);

        assert_eq!(window.len(), 10);
        assert_eq!(window[0].sequence, 10);
        assert_eq!(window[9].sequence, 19);
        assert!(window.windows(2).all(|w| w[0].sequence < w[1].sequence));
        assert_eq!(store.len(), 20);
    }

    #[test]
    fn test_windowed_zero() {
        let store = store_with(5);
        assert!(store.windowed(0).is_empty());
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn test_round_trip_through_store() {
        let kv = MemoryKvStore::new();
        {
            let mut store = ConversationStore::restore(Box::new(kv.clone()));
            store.append(Role::User, "上个月花了多少？");
            store.append(Role::Assistant, "总计 ¥3,200。");
        }

        let restored = ConversationStore::restore(Box::new(kv));
        let messages = restored.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "总计 ¥3,200。");
        assert_eq!(messages[1].sequence, 1);
    }

    #[test]
    fn test_round_trip_through_database() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("history.db");
        {
            let db = Database::open_at(path.clone()).unwrap();
            db.migrate().unwrap();
            let mut store = ConversationStore::restore(Box::new(db));
            store.append(Role::User, "hello");
        }

        let db = Database::open_at(path).unwrap();
        let store = ConversationStore::restore(Box::new(db));
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].content, "hello");
    }

    #[test]
    fn test_persisted_value_is_versioned_envelope() {
        let kv = MemoryKvStore::new();
        let mut store = ConversationStore::restore(Box::new(kv.clone()));
        store.append(Role::User, "hi");

        let raw = kv.get(HISTORY_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_restore_accepts_legacy_array() {
        let kv = MemoryKvStore::new();
        kv.set(
            HISTORY_KEY,
            r#"[{"role":"user","content":"a"},{"role":"assistant","content":"b"}]"#,
        )
        .unwrap();

        let store = ConversationStore::restore(Box::new(kv));
        assert_eq!(store.len(), 2);
        assert_eq!(store.messages()[1].role, Role::Assistant);
        assert_eq!(store.messages()[1].sequence, 1);
    }

    #[test]
    fn test_restore_malformed_yields_empty() {
        let kv = MemoryKvStore::new();
        kv.set(HISTORY_KEY, "{not json").unwrap();
        assert!(ConversationStore::restore(Box::new(kv.clone())).is_empty());

        kv.set(HISTORY_KEY, r#"[{"role":"system","content":"x"}]"#).unwrap();
        assert!(ConversationStore::restore(Box::new(kv)).is_empty());
    }

    #[test]
    fn test_restore_unknown_version_yields_empty() {
        let kv = MemoryKvStore::new();
        kv.set(HISTORY_KEY, r#"{"version":2,"messages":[]}"#).unwrap();
        assert!(ConversationStore::restore(Box::new(kv)).is_empty());

        assert!(matches!(
            decode_history(r#"{"version":2,"messages":[]}"#),
            Err(SessionError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_clear_erases_persisted_copy() {
        let kv = MemoryKvStore::new();
        let mut store = ConversationStore::restore(Box::new(kv.clone()));
        store.append(Role::User, "hi");

        store.clear();

        assert!(store.is_empty());
        assert_eq!(kv.get(HISTORY_KEY).unwrap(), None);
        assert!(ConversationStore::restore(Box::new(kv)).is_empty());
    }

    #[test]
    fn test_custom_key() {
        let kv = MemoryKvStore::new();
        let mut store = ConversationStore::restore_with_key(Box::new(kv.clone()), "other");
        store.append(Role::User, "hi");

        assert_eq!(store.key(), "other");
        assert!(kv.get("other").unwrap().is_some());
        assert_eq!(kv.get(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_persistence_failure_does_not_block() {
        let mut store = ConversationStore::restore(Box::new(FailingKvStore));
        assert!(store.is_empty());

        store.append(Role::User, "still works");
        store.append(Role::Assistant, "yes");
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
    }

    // =========================================================================
    // Types
    // =========================================================================

    #[test]
    fn test_role_display_and_serde() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_session_error_from_kv_error() {
        let err: SessionError = KvError::Unavailable("x".to_string()).into();
        assert!(matches!(err, SessionError::Storage(_)));
    }
}
