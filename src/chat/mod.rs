//! Send/receive orchestration for the advisor chat.
//!
//! [`ChatOrchestrator::send`] runs one complete cycle:
//!
//! 1. take the history window and append the user message
//! 2. open the response through the [`ChatBackend`]
//! 3. pull chunks, decode, scan, and fan out to the sink and status publisher
//! 4. append the assistant message (or a single error message)
//!
//! The only suspension points are "open" and "pull next chunk"; both race the
//! caller's [`CancellationToken`] with cancellation taking priority, so once a
//! session is cancelled nothing more from it reaches the sink.
//!
//! [`ChatHandle`] wraps an orchestrator in its own task for callers that need
//! to cancel or supersede a running session from elsewhere.

mod handle;
mod session;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::{ByteSource, ChatBackend, ChatRequest, StreamError};
use crate::config::ChatConfig;
use crate::messaging::{
    BufferSink, BusSink, ChatEvent, EventSender, OutputSink, SessionOutcome, StatusPublisher,
    ToolStatus,
};
use crate::session::{ConversationStore, Message, Role};
use crate::stream::{MarkerScanner, ScanEvent, Utf8StreamDecoder};

pub use handle::{ChatHandle, HandleError};
pub use session::{SessionId, SessionState, StreamSession};

/// Apology shown when the advisor could not be reached.
pub const FALLBACK_ERROR_ZH: &str = "抱歉，我在处理您的请求时遇到了错误。";
pub const FALLBACK_ERROR_EN: &str = "Sorry, I ran into an error while processing your request.";

/// Generic apology in the conversation language.
pub fn fallback_error_message(language: &str) -> &'static str {
    if language.to_lowercase().starts_with("zh") {
        FALLBACK_ERROR_ZH
    } else {
        FALLBACK_ERROR_EN
    }
}

/// Text of the assistant message recorded for a failed session.
pub fn describe_error(err: &StreamError, language: &str) -> String {
    match err {
        StreamError::Backend { detail, .. } => detail.clone(),
        StreamError::Http { status } => {
            format!("{} (HTTP {})", fallback_error_message(language), status)
        }
        StreamError::Transport(_) => fallback_error_message(language).to_string(),
    }
}

/// Result of one [`ChatOrchestrator::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub session: SessionId,
    pub state: SessionState,
    pub outcome: SessionOutcome,
    /// Assistant message appended to the history, if any.
    pub reply: Option<String>,
}

impl SessionReport {
    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }
}

enum Interrupt {
    Cancelled,
    Failed(StreamError),
}

/// Race `fut` against `token`, preferring cancellation when both are ready.
async fn or_cancel<F: Future>(fut: F, token: &CancellationToken) -> Result<F::Output, Interrupt> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Interrupt::Cancelled),
        out = fut => Ok(out),
    }
}

/// Drives send/receive cycles for one conversation.
pub struct ChatOrchestrator {
    backend: Arc<dyn ChatBackend>,
    store: ConversationStore,
    status: StatusPublisher,
    sink: Box<dyn OutputSink>,
    events: Option<EventSender>,
    config: ChatConfig,
}

impl ChatOrchestrator {
    /// Create an orchestrator that buffers text in memory.
    pub fn new(backend: Arc<dyn ChatBackend>, store: ConversationStore, config: ChatConfig) -> Self {
        Self {
            backend,
            store,
            status: StatusPublisher::new(),
            sink: Box::new(BufferSink::new()),
            events: None,
            config,
        }
    }

    /// Publish text, status changes and lifecycle events on the bus.
    pub fn with_bus(self, sender: EventSender) -> Self {
        self.with_sink(Box::new(BusSink::new(sender.clone())))
            .with_events(sender)
    }

    /// Publish status changes and lifecycle events on the bus.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.status = StatusPublisher::new().with_bus(sender.clone());
        self.events = Some(sender);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn status(&self) -> watch::Receiver<ToolStatus> {
        self.status.subscribe()
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Last `limit` messages, or all of them.
    pub fn history(&self, limit: Option<usize>) -> Vec<Message> {
        match limit {
            Some(n) => self.store.windowed(n).to_vec(),
            None => self.store.messages().to_vec(),
        }
    }

    pub fn clear_history(&mut self) {
        self.store.clear();
        tracing::info!("Chat history cleared");
    }

    /// Replace the configuration; a new backend is used from the next send.
    pub fn reconfigure(&mut self, config: ChatConfig, backend: Option<Arc<dyn ChatBackend>>) {
        self.config = config;
        if let Some(backend) = backend {
            self.backend = backend;
        }
    }

    /// Send `text` and stream the answer.
    ///
    /// Returns `None` when `text` is blank; nothing is sent or recorded.
    pub async fn send(&mut self, text: &str, cancel: &CancellationToken) -> Option<SessionReport> {
        if text.trim().is_empty() {
            tracing::debug!("Ignoring blank message");
            return None;
        }

        // The window excludes the message being sent.
        let history = self
            .store
            .windowed(self.config.history_window)
            .iter()
            .map(Message::to_entry)
            .collect();
        let request = ChatRequest {
            message: text.to_string(),
            history,
            language: self.config.language.clone(),
        };
        self.store.append(Role::User, text);

        let mut session = StreamSession::new();
        let id = session.id();
        tracing::info!(
            session = %id,
            history = request.history.len(),
            "Sending chat message"
        );
        self.publish(ChatEvent::SessionStarted { session: id });

        let result = self.stream(&mut session, &request, cancel).await;
        self.status.reset();

        let (state, outcome, reply) = match result {
            Ok(()) => {
                session.advance(SessionState::Completed);
                let reply = session.text().to_string();
                self.store.append(Role::Assistant, reply.clone());
                tracing::info!(session = %id, chars = reply.chars().count(), "Response completed");
                (SessionState::Completed, SessionOutcome::Completed, Some(reply))
            }
            Err(Interrupt::Cancelled) => {
                session.advance(SessionState::Aborted);
                tracing::info!(session = %id, "Response aborted");
                (SessionState::Aborted, SessionOutcome::Aborted, None)
            }
            Err(Interrupt::Failed(err)) => {
                session.advance(SessionState::Failed);
                tracing::warn!(session = %id, error = %err, "Response failed");
                let message = describe_error(&err, &self.config.language);
                self.store.append(Role::Assistant, message.clone());
                (
                    SessionState::Failed,
                    SessionOutcome::Failed {
                        message: message.clone(),
                    },
                    Some(message),
                )
            }
        };

        self.publish(ChatEvent::SessionEnded {
            session: id,
            outcome: outcome.clone(),
        });

        Some(SessionReport {
            session: id,
            state,
            outcome,
            reply,
        })
    }

    async fn stream(
        &mut self,
        session: &mut StreamSession,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<(), Interrupt> {
        let mut source: Box<dyn ByteSource> = or_cancel(self.backend.open(request), cancel)
            .await?
            .map_err(Interrupt::Failed)?;
        session.advance(SessionState::Streaming);

        let mut decoder = Utf8StreamDecoder::new();
        let mut scanner = MarkerScanner::new(self.config.marker_syntax());

        while let Some(chunk) = or_cancel(source.next_chunk(), cancel).await? {
            let bytes = chunk.map_err(Interrupt::Failed)?;
            tracing::trace!(session = %session.id(), bytes = bytes.len(), "Chunk received");

            let text = decoder.decode(&bytes);
            let events = scanner.push(&text);
            self.dispatch(session, events);
        }

        let tail = decoder.finish();
        let mut events = scanner.push(&tail);
        events.extend(scanner.finish());
        self.dispatch(session, events);

        Ok(())
    }

    fn dispatch(&mut self, session: &mut StreamSession, events: Vec<ScanEvent>) {
        for event in events {
            match event {
                ScanEvent::Text(text) => {
                    session.push_text(&text);
                    self.sink.push_text(session.id(), &text);
                }
                other => {
                    self.status.apply(&other);
                }
            }
        }
    }

    fn publish(&self, event: ChatEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backends for orchestrator and handle tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::client::{ByteSource, ChannelSource, ChatBackend, ChatRequest, StreamError};

    /// What the next `open` call does.
    pub enum Script {
        /// Succeed and yield these chunks.
        Chunks(Vec<Vec<u8>>),
        /// Yield these chunks, then fail.
        ChunksThenError(Vec<Vec<u8>>, StreamError),
        /// Fail to open.
        OpenError(StreamError),
        /// Succeed with a source the test feeds by hand.
        Channel(ChannelSource),
        /// Never finish opening.
        Hang,
    }

    pub fn text_chunks(chunks: &[&str]) -> Script {
        Script::Chunks(chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    pub struct ScriptedBackend {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    struct VecSource {
        chunks: VecDeque<Result<Bytes, StreamError>>,
    }

    #[async_trait]
    impl ByteSource for VecSource {
        async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
            self.chunks.pop_front()
        }
    }

    fn vec_source(chunks: Vec<Vec<u8>>, error: Option<StreamError>) -> Box<dyn ByteSource> {
        let mut queue: VecDeque<_> = chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect();
        if let Some(error) = error {
            queue.push_back(Err(error));
        }
        Box::new(VecSource { chunks: queue })
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn open(&self, request: &ChatRequest) -> Result<Box<dyn ByteSource>, StreamError> {
            self.requests.lock().unwrap().push(request.clone());
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .expect("no script left for this request");

            match script {
                Script::Chunks(chunks) => Ok(vec_source(chunks, None)),
                Script::ChunksThenError(chunks, error) => Ok(vec_source(chunks, Some(error))),
                Script::OpenError(error) => Err(error),
                Script::Channel(source) => Ok(Box::new(source)),
                Script::Hang => std::future::pending().await,
            }
        }
    }
}
