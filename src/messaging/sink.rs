//! Output sinks for cleaned response text.
//!
//! A sink receives the visible text of a session in stream order. Sinks must
//! accept every fragment; the orchestrator never drops text for a slow
//! consumer.

use std::sync::{Arc, Mutex};

use super::{ChatEvent, EventSender};
use crate::chat::SessionId;

/// Ordered append-only destination for visible text.
pub trait OutputSink: Send {
    fn push_text(&mut self, session: SessionId, text: &str);
}

/// Publishes text as [`ChatEvent::TextDelta`] on the event bus.
#[derive(Clone)]
pub struct BusSink {
    sender: EventSender,
}

impl BusSink {
    pub fn new(sender: EventSender) -> Self {
        Self { sender }
    }
}

impl OutputSink for BusSink {
    fn push_text(&mut self, session: SessionId, text: &str) {
        if self.sender.send(ChatEvent::text_delta(session, text)).is_err() {
            tracing::trace!(%session, "No bus subscribers for text delta");
        }
    }
}

/// Collects text in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    fragments: Arc<Mutex<Vec<(SessionId, String)>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fragment received so far, in order.
    pub fn fragments(&self) -> Vec<(SessionId, String)> {
        self.lock().clone()
    }

    /// Concatenated text of all sessions.
    pub fn contents(&self) -> String {
        self.lock().iter().map(|(_, text)| text.as_str()).collect()
    }

    /// Concatenated text of a single session.
    pub fn contents_for(&self, session: SessionId) -> String {
        self.lock()
            .iter()
            .filter(|(id, _)| *id == session)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SessionId, String)>> {
        self.fragments.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OutputSink for BufferSink {
    fn push_text(&mut self, session: SessionId, text: &str) {
        self.lock().push((session, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{EventBus, TextDeltaMessage};

    #[test]
    fn test_buffer_sink_keeps_order() {
        let mut sink = BufferSink::new();
        let id = SessionId::new();

        sink.push_text(id, "Hello ");
        sink.push_text(id, "World");

        assert_eq!(sink.contents(), "Hello World");
        assert_eq!(sink.fragments().len(), 2);
    }

    #[test]
    fn test_buffer_sink_clones_share_buffer() {
        let sink = BufferSink::new();
        let mut writer = sink.clone();
        let id = SessionId::new();

        writer.push_text(id, "shared");
        assert_eq!(sink.contents(), "shared");

        sink.clear();
        assert_eq!(writer.contents(), "");
    }

    #[test]
    fn test_buffer_sink_contents_for_session() {
        let mut sink = BufferSink::new();
        let first = SessionId::new();
        let second = SessionId::new();

        sink.push_text(first, "a");
        sink.push_text(second, "b");
        sink.push_text(first, "c");

        assert_eq!(sink.contents_for(first), "ac");
        assert_eq!(sink.contents_for(second), "b");
    }

    #[test]
    fn test_bus_sink_publishes_text_delta() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let mut sink = BusSink::new(bus.sender());
        let id = SessionId::new();

        sink.push_text(id, "chunk");

        assert_eq!(
            receiver.try_recv().unwrap(),
            Some(ChatEvent::text_delta(id, "chunk"))
        );
    }

    #[test]
    fn test_bus_sink_keeps_every_delta_for_a_slow_subscriber() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        let mut sink = BusSink::new(bus.sender());
        let id = SessionId::new();

        for i in 0..1500 {
            sink.push_text(id, &format!("{} ", i));
        }

        let text: String = std::iter::from_fn(|| receiver.try_recv().unwrap())
            .map(|event| match event {
                ChatEvent::TextDelta(TextDeltaMessage { text, .. }) => text,
                other => panic!("Expected text delta, got {:?}", other),
            })
            .collect();
        let expected: String = (0..1500).map(|i| format!("{} ", i)).collect();
        assert_eq!(text, expected);
    }

    #[test]
    fn test_bus_sink_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        let mut sink = BusSink::new(bus.sender());
        sink.push_text(SessionId::new(), "nobody listening");
    }
}
