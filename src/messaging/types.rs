//! Event types for orchestrator-UI communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::SessionId;

/// Message levels for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A free-standing notice (command feedback, warnings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeMessage {
    pub level: MessageLevel,
    pub text: String,
}

/// Current tool activity reported by the advisor backend.
///
/// At most one tool runs at a time; a second start replaces the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Idle,
    Running {
        name: String,
        started_at: DateTime<Utc>,
    },
}

impl ToolStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ToolStatus::Running { .. })
    }

    /// Name of the running tool, if any.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolStatus::Running { name, .. } => Some(name),
            ToolStatus::Idle => None,
        }
    }
}

/// How a stream session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Aborted,
    Failed { message: String },
}

/// Streamed visible text from one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDeltaMessage {
    pub session: SessionId,
    pub text: String,
}

/// Any event published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    SessionStarted { session: SessionId },
    TextDelta(TextDeltaMessage),
    ToolStatusChanged { status: ToolStatus },
    SessionEnded {
        session: SessionId,
        outcome: SessionOutcome,
    },
    Notice(NoticeMessage),
}

impl ChatEvent {
    /// Create an info notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self::notice(MessageLevel::Info, text)
    }

    /// Create a success notice.
    pub fn success(text: impl Into<String>) -> Self {
        Self::notice(MessageLevel::Success, text)
    }

    /// Create a warning notice.
    pub fn warning(text: impl Into<String>) -> Self {
        Self::notice(MessageLevel::Warning, text)
    }

    /// Create an error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self::notice(MessageLevel::Error, text)
    }

    fn notice(level: MessageLevel, text: impl Into<String>) -> Self {
        Self::Notice(NoticeMessage {
            level,
            text: text.into(),
        })
    }

    /// Create a text delta.
    pub fn text_delta(session: SessionId, text: &str) -> Self {
        Self::TextDelta(TextDeltaMessage {
            session,
            text: text.to_string(),
        })
    }

    /// Session this event belongs to, if any.
    pub fn session(&self) -> Option<SessionId> {
        match self {
            ChatEvent::SessionStarted { session }
            | ChatEvent::SessionEnded { session, .. }
            | ChatEvent::TextDelta(TextDeltaMessage { session, .. }) => Some(*session),
            ChatEvent::ToolStatusChanged { .. } | ChatEvent::Notice(_) => None,
        }
    }
}
