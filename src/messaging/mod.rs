//! Messaging between the chat orchestrator and its observers.
//!
//! ## Architecture
//!
//! ```text
//!     ┌──────────────────────────────┐
//!     │       ChatOrchestrator       │
//!     └──────┬───────────────┬───────┘
//!            │ text          │ tool events
//!            ▼               ▼
//!     ┌────────────┐  ┌─────────────────┐
//!     │  BusSink   │  │ StatusPublisher │──▶ watch::Receiver<ToolStatus>
//!     └─────┬──────┘  └────────┬────────┘
//!           │ publish          │ mirror
//!           ▼                  ▼
//!     ┌──────────────────────────────┐
//!     │           EventBus           │
//!     └──────────────┬───────────────┘
//!                    │ fan-out
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!    ┌──────────┐        ┌──────────┐
//!    │ Terminal │        │  Tests / │
//!    │ Renderer │        │ embedders│
//!    └──────────┘        └──────────┘
//! ```
//!
//! Text and status changes travel through the same bus, so a subscriber
//! sees them in stream order. Each subscriber has its own unbounded queue;
//! a slow renderer never loses text.
//!
//! ## Usage
//!
//! ```ignore
//! use moneychat::messaging::{EventBus, TerminalRenderer};
//!
//! let bus = EventBus::new();
//! let receiver = bus.subscribe();
//! tokio::spawn(async move {
//!     TerminalRenderer::new().run_session(receiver, None).await;
//! });
//! ```

mod bus;
mod renderer;
mod sink;
mod spinner;
mod status;
mod types;

pub use bus::{BusError, EventBus, EventReceiver, EventSender};
pub use renderer::{RenderStyle, TerminalRenderer};
pub use sink::{BufferSink, BusSink, OutputSink};
pub use spinner::{Spinner, SpinnerConfig, SpinnerHandle};
pub use status::StatusPublisher;
pub use types::*;
