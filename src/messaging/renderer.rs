//! Terminal renderer for chat events.

use super::{ChatEvent, EventReceiver, MessageLevel, SessionOutcome, ToolStatus};
use crate::messaging::{BusError, SpinnerHandle};
use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    QueueableCommand,
};
use std::io::{stdout, Write};

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub info_color: Color,
    pub success_color: Color,
    pub warning_color: Color,
    pub error_color: Color,
    pub tool_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            info_color: Color::White,
            success_color: Color::Green,
            warning_color: Color::Yellow,
            error_color: Color::Red,
            tool_color: Color::Yellow,
        }
    }
}

/// Terminal renderer for chat events.
///
/// Tracks the cursor column loosely (start of line or not) so tool badges and
/// session footers always begin on their own line.
pub struct TerminalRenderer {
    style: RenderStyle,
    at_line_start: bool,
    tool_line_open: bool,
}

impl TerminalRenderer {
    /// Create a new renderer.
    pub fn new() -> Self {
        Self::with_style(RenderStyle::default())
    }

    /// Create with custom style.
    pub fn with_style(style: RenderStyle) -> Self {
        Self {
            style,
            at_line_start: true,
            tool_line_open: false,
        }
    }

    /// Render an event to stdout.
    pub fn render(&mut self, event: &ChatEvent) -> std::io::Result<()> {
        let mut out = stdout().lock();
        self.render_to(&mut out, event)
    }

    /// Render an event to any writer.
    pub fn render_to<W: Write>(&mut self, out: &mut W, event: &ChatEvent) -> std::io::Result<()> {
        match event {
            ChatEvent::SessionStarted { .. } => {
                self.at_line_start = true;
                self.tool_line_open = false;
            }
            ChatEvent::TextDelta(delta) => self.render_text_delta(out, &delta.text)?,
            ChatEvent::ToolStatusChanged { status } => self.render_tool_status(out, status)?,
            ChatEvent::SessionEnded { outcome, .. } => self.render_session_end(out, outcome)?,
            ChatEvent::Notice(notice) => self.render_notice(out, notice.level, &notice.text)?,
        }
        out.flush()
    }

    fn render_text_delta<W: Write>(&mut self, out: &mut W, text: &str) -> std::io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.tool_line_open {
            out.queue(Print("\n"))?;
            self.tool_line_open = false;
        }
        out.queue(Print(text))?;
        self.at_line_start = text.ends_with('\n');
        Ok(())
    }

    fn render_tool_status<W: Write>(
        &mut self,
        out: &mut W,
        status: &ToolStatus,
    ) -> std::io::Result<()> {
        match status {
            ToolStatus::Running { name, .. } => {
                self.ensure_line_start(out)?;
                out.queue(SetForegroundColor(self.style.tool_color))?
                    .queue(Print("🔧 "))?
                    .queue(Print(name))?
                    .queue(ResetColor)?;
                self.tool_line_open = true;
                self.at_line_start = false;
            }
            ToolStatus::Idle => {
                if self.tool_line_open {
                    out.queue(SetForegroundColor(self.style.success_color))?
                        .queue(Print(" ✓\n"))?
                        .queue(ResetColor)?;
                    self.tool_line_open = false;
                    self.at_line_start = true;
                }
            }
        }
        Ok(())
    }

    fn render_session_end<W: Write>(
        &mut self,
        out: &mut W,
        outcome: &SessionOutcome,
    ) -> std::io::Result<()> {
        self.ensure_line_start(out)?;
        match outcome {
            SessionOutcome::Completed => {}
            SessionOutcome::Aborted => {
                out.queue(SetAttribute(Attribute::Dim))?
                    .queue(Print("[cancelled]\n"))?
                    .queue(SetAttribute(Attribute::Reset))?;
            }
            SessionOutcome::Failed { message } => {
                out.queue(SetForegroundColor(self.style.error_color))?
                    .queue(Print("✗ "))?
                    .queue(Print(message))?
                    .queue(Print("\n"))?
                    .queue(ResetColor)?;
            }
        }
        self.at_line_start = true;
        Ok(())
    }

    fn render_notice<W: Write>(
        &mut self,
        out: &mut W,
        level: MessageLevel,
        text: &str,
    ) -> std::io::Result<()> {
        let color = match level {
            MessageLevel::Info => self.style.info_color,
            MessageLevel::Success => self.style.success_color,
            MessageLevel::Warning => self.style.warning_color,
            MessageLevel::Error => self.style.error_color,
        };

        let prefix = match level {
            MessageLevel::Success => "✓ ",
            MessageLevel::Warning => "⚠ ",
            MessageLevel::Error => "✗ ",
            MessageLevel::Info => "",
        };

        self.ensure_line_start(out)?;
        out.queue(SetForegroundColor(color))?
            .queue(Print(prefix))?
            .queue(Print(text))?
            .queue(Print("\n"))?
            .queue(ResetColor)?;
        self.at_line_start = true;
        Ok(())
    }

    fn ensure_line_start<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        if !self.at_line_start {
            out.queue(Print("\n"))?;
            self.at_line_start = true;
        }
        self.tool_line_open = false;
        Ok(())
    }

    /// Render one session from the bus, returning after its end event.
    ///
    /// `spinner` is stopped before the first visible output.
    pub async fn run_session(
        &mut self,
        mut receiver: EventReceiver,
        spinner: Option<SpinnerHandle>,
    ) {
        let mut spinner = spinner;

        loop {
            match receiver.recv().await {
                Ok(ChatEvent::SessionStarted { .. }) => {}
                Ok(event) => {
                    if let Some(spinner) = spinner.take() {
                        spinner.stop().await;
                    }

                    let done = matches!(event, ChatEvent::SessionEnded { .. });
                    if let Err(e) = self.render(&event) {
                        tracing::debug!(error = %e, "Failed to render event");
                    }
                    if done {
                        break;
                    }
                }
                Err(BusError::Closed) => break,
            }
        }

        if let Some(spinner) = spinner {
            spinner.stop().await;
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}
