//! Moneychat Library
//!
//! Streaming chat channel for a personal-finance advisor: the advisor answers
//! with a plain-text stream that may carry tool-activity marker lines, and
//! this crate turns it into visible text plus a live tool status.
//!
//! ## Main Components
//!
//! - [`stream`] - Incremental UTF-8 decoding and marker scanning
//! - [`client`] - Advisor HTTP backend and byte sources
//! - [`chat`] - Send/receive orchestration, cancellation, the chat actor
//! - [`messaging`] - Event bus, output sinks, tool status, terminal rendering
//! - [`session`] - Persistent conversation history
//! - [`config`] - Settings and resolved configuration
//! - [`db`] - SQLite database and key-value store
//! - [`cli`] - Command-line interface (REPL, commands, runner)
//!
//! ## Quick Start
//!
//! ```ignore
//! use moneychat::{ChatConfig, ChatOrchestrator, ConversationStore, Database, HttpBackend};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let db = Database::open()?;
//! db.migrate()?;
//! let config = ChatConfig::default();
//! let backend = HttpBackend::from_config(&config)?;
//! let store = ConversationStore::restore(Box::new(db.reopen()?));
//! let mut chat = ChatOrchestrator::new(Arc::new(backend), store, config);
//! let report = chat.send("How much did I spend on food?", &CancellationToken::new()).await;
//! ```

pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod messaging;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use chat::{ChatHandle, ChatOrchestrator, SessionId, SessionReport, SessionState};
pub use client::{ByteSource, ChatBackend, ChatRequest, HttpBackend, StreamError};
pub use config::{ChatConfig, Settings, XdgDirs};
pub use db::{Database, KeyValueStore};
pub use messaging::{ChatEvent, EventBus, OutputSink, StatusPublisher, ToolStatus};
pub use session::{ConversationStore, Message, Role};
pub use stream::{MarkerScanner, MarkerSyntax, ScanEvent, Utf8StreamDecoder};
