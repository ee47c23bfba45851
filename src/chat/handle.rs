//! Actor wrapper around [`ChatOrchestrator`].
//!
//! The orchestrator lives in its own task and is driven through commands.
//! At most one session is active: a new send cancels the running one first,
//! and its source is dropped before the next session starts.

use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ChatOrchestrator, SessionReport};
use crate::client::ChatBackend;
use crate::config::ChatConfig;
use crate::messaging::ToolStatus;
use crate::session::Message;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    #[error("Chat task has stopped")]
    Closed,
}

enum Command {
    Send {
        text: String,
        reply: oneshot::Sender<Option<SessionReport>>,
    },
    Cancel,
    Clear {
        reply: oneshot::Sender<()>,
    },
    History {
        limit: Option<usize>,
        reply: oneshot::Sender<Vec<Message>>,
    },
    Reconfigure {
        config: ChatConfig,
        backend: Option<Arc<dyn ChatBackend>>,
    },
    Shutdown,
}

/// Cloneable handle to a running chat task.
#[derive(Clone)]
pub struct ChatHandle {
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<ToolStatus>,
}

impl ChatHandle {
    /// Move `orchestrator` into a new task.
    pub fn spawn(orchestrator: ChatOrchestrator) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let status = orchestrator.status();
        let task = tokio::spawn(run(orchestrator, rx));
        (Self { tx, status }, task)
    }

    /// Queue a message; the receiver resolves when its session ends.
    ///
    /// Any session still running is cancelled.
    pub async fn submit(
        &self,
        text: impl Into<String>,
    ) -> Result<oneshot::Receiver<Option<SessionReport>>, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Send {
            text: text.into(),
            reply,
        })
        .await?;
        Ok(rx)
    }

    /// Send a message and wait for its session to end.
    pub async fn send(&self, text: impl Into<String>) -> Result<Option<SessionReport>, HandleError> {
        let rx = self.submit(text).await?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    /// Cancel the running session, if any.
    pub async fn cancel(&self) -> Result<(), HandleError> {
        self.command(Command::Cancel).await
    }

    pub async fn clear(&self) -> Result<(), HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Clear { reply }).await?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<Message>, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::History { limit, reply }).await?;
        rx.await.map_err(|_| HandleError::Closed)
    }

    /// Apply new settings from the next session on.
    pub async fn reconfigure(
        &self,
        config: ChatConfig,
        backend: Option<Arc<dyn ChatBackend>>,
    ) -> Result<(), HandleError> {
        self.command(Command::Reconfigure { config, backend }).await
    }

    /// Cancel any running session and stop the task.
    pub async fn shutdown(&self) -> Result<(), HandleError> {
        self.command(Command::Shutdown).await
    }

    pub fn status(&self) -> watch::Receiver<ToolStatus> {
        self.status.clone()
    }

    async fn command(&self, command: Command) -> Result<(), HandleError> {
        self.tx.send(command).await.map_err(|_| HandleError::Closed)
    }
}

async fn run(mut orchestrator: ChatOrchestrator, mut rx: mpsc::Receiver<Command>) {
    let mut pending: VecDeque<Command> = VecDeque::new();
    let mut stopping = false;

    loop {
        let command = match pending.pop_front() {
            Some(command) => command,
            None if stopping => break,
            None => match rx.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Send { text, reply } => {
                let token = CancellationToken::new();
                let report = {
                    let session = orchestrator.send(&text, &token);
                    tokio::pin!(session);
                    let mut rx_open = !stopping;

                    loop {
                        tokio::select! {
                            report = &mut session => break report,
                            incoming = rx.recv(), if rx_open => match incoming {
                                Some(Command::Cancel) => token.cancel(),
                                Some(next @ Command::Send { .. }) => {
                                    tracing::debug!("Superseding running session");
                                    token.cancel();
                                    pending.push_back(next);
                                }
                                Some(Command::Shutdown) | None => {
                                    token.cancel();
                                    stopping = true;
                                    rx_open = false;
                                }
                                Some(other) => pending.push_back(other),
                            },
                        }
                    }
                };
                let _ = reply.send(report);
            }
            Command::Cancel => {}
            Command::Clear { reply } => {
                orchestrator.clear_history();
                let _ = reply.send(());
            }
            Command::History { limit, reply } => {
                let _ = reply.send(orchestrator.history(limit));
            }
            Command::Reconfigure { config, backend } => {
                orchestrator.reconfigure(config, backend);
            }
            Command::Shutdown => stopping = true,
        }
    }

    tracing::debug!("Chat task stopped");
}
