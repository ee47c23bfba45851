//! Single-slot tool status derived from scanner events.
//!
//! ```text
//! Idle ──Started(n)──▶ Running(n) ──Ended──▶ Idle
//!                      Running(n) ──Started(m)──▶ Running(m)
//! ```
//!
//! Observers either hold a [`watch::Receiver`] for the latest value or read
//! [`ChatEvent::ToolStatusChanged`] from the bus, which keeps status changes
//! in order with the surrounding text.

use chrono::Utc;
use tokio::sync::watch;

use super::{ChatEvent, EventSender, ToolStatus};
use crate::stream::ScanEvent;

/// Publishes [`ToolStatus`] transitions.
pub struct StatusPublisher {
    tx: watch::Sender<ToolStatus>,
    events: Option<EventSender>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ToolStatus::Idle);
        Self { tx, events: None }
    }

    /// Mirror every transition onto the event bus.
    pub fn with_bus(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ToolStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ToolStatus {
        self.tx.borrow().clone()
    }

    /// Apply a scanner event. Text events are ignored.
    ///
    /// Returns whether the status changed.
    pub fn apply(&self, event: &ScanEvent) -> bool {
        match event {
            ScanEvent::ToolStarted { name } => self.start(name),
            ScanEvent::ToolEnded => self.end(),
            ScanEvent::Text(_) => false,
        }
    }

    /// Enter `Running(name)`, replacing any running tool.
    pub fn start(&self, name: &str) -> bool {
        let status = ToolStatus::Running {
            name: name.to_string(),
            started_at: Utc::now(),
        };
        self.transition(|current| {
            *current = status;
            true
        })
    }

    /// Leave `Running`. A no-op while idle.
    pub fn end(&self) -> bool {
        self.to_idle()
    }

    /// Force `Idle`; called on every terminal session transition.
    pub fn reset(&self) -> bool {
        self.to_idle()
    }

    fn to_idle(&self) -> bool {
        self.transition(|current| {
            if current.is_running() {
                *current = ToolStatus::Idle;
                true
            } else {
                false
            }
        })
    }

    fn transition(&self, modify: impl FnOnce(&mut ToolStatus) -> bool) -> bool {
        let changed = self.tx.send_if_modified(modify);
        if changed {
            let status = self.current();
            tracing::debug!(?status, "Tool status changed");
            if let Some(events) = &self.events {
                let _ = events.send(ChatEvent::ToolStatusChanged { status });
            }
        }
        changed
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
