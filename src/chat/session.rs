//! Per-send stream session state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one send/receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a stream session.
///
/// ```text
/// Sending ──▶ Streaming ──▶ Completed
///    │            │
///    └────────────┴──▶ Aborted | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Sending,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Aborted | SessionState::Failed
        )
    }

    fn can_advance_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Sending, Streaming)
                | (Sending, Aborted)
                | (Sending, Failed)
                | (Streaming, Completed)
                | (Streaming, Aborted)
                | (Streaming, Failed)
        )
    }
}

/// One in-flight response and the visible text received so far.
#[derive(Debug, Clone)]
pub struct StreamSession {
    id: SessionId,
    state: SessionState,
    accumulated_text: String,
    started_at: DateTime<Utc>,
}

impl StreamSession {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Sending,
            accumulated_text: String::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.accumulated_text
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Move to `next`. Illegal transitions are ignored and reported as
    /// `false`.
    pub fn advance(&mut self, next: SessionState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                session = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring invalid session transition"
            );
            return false;
        }
        tracing::trace!(session = %self.id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        true
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        self.accumulated_text.push_str(text);
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}
