//! Lossless fan-out event bus between the orchestrator and its observers.
//!
//! Every subscriber owns an unbounded queue, so a slow renderer delays its
//! own output but never loses text. Events are delivered to all subscribers
//! in the order they were sent.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::ChatEvent;

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<ChatEvent>>>>;

fn lock(subscribers: &Subscribers) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<ChatEvent>>> {
    subscribers.lock().unwrap_or_else(|e| e.into_inner())
}

/// Sender half of the event bus.
#[derive(Clone)]
pub struct EventSender {
    subscribers: Subscribers,
}

impl EventSender {
    /// Deliver `event` to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned. Fails with
    /// [`BusError::Closed`] when nobody is listening.
    pub fn send(&self, event: ChatEvent) -> Result<(), BusError> {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

/// Receiver half of the event bus.
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ChatEvent>,
}

impl EventReceiver {
    /// Receive the next event; `Closed` once the bus and all senders are gone.
    pub async fn recv(&mut self) -> Result<ChatEvent, BusError> {
        self.rx.recv().await.ok_or(BusError::Closed)
    }

    /// Try to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<ChatEvent>, BusError> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }
}

/// Event bus for orchestrator-UI communication.
#[derive(Default)]
pub struct EventBus {
    subscribers: Subscribers,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Subscribe to events sent from now on.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        EventReceiver { rx }
    }
}

/// Bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Channel closed")]
    Closed,
}
