//! Marker scanner: splits decoded text into visible prose and tool events.
//!
//! The scanner keeps a pending buffer across chunks because a marker line can
//! be cut anywhere by the network. Markers are line-anchored: an opener only
//! counts at the start of a line. Text is released as soon as it can no
//! longer be the start of a marker; once an opener has been seen at a line
//! start, the rest of its line is held until the line terminator (or end of
//! stream) arrives, and then either swallowed as an event or released
//! verbatim.

use super::markers::{Marker, MarkerSyntax};

/// Longest visible line kept for leaked-marker diagnostics.
const DIAGNOSTIC_LINE_LIMIT: usize = 256;

/// Output of the scanner, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Display-ready text with markers removed.
    Text(String),
    /// A backend tool invocation started.
    ToolStarted { name: String },
    /// The running tool finished.
    ToolEnded,
}

impl From<Marker> for ScanEvent {
    fn from(marker: Marker) -> Self {
        match marker {
            Marker::Start { name } => ScanEvent::ToolStarted { name },
            Marker::End => ScanEvent::ToolEnded,
        }
    }
}

/// Streaming marker scanner.
pub struct MarkerScanner {
    syntax: MarkerSyntax,
    /// Text not yet classified.
    pending: String,
    /// Whether `pending` begins at the start of a line.
    at_line_start: bool,
    /// The visible line currently being emitted, for diagnostics only.
    visible_line: String,
}

impl MarkerScanner {
    pub fn new(syntax: MarkerSyntax) -> Self {
        Self {
            syntax,
            pending: String::new(),
            at_line_start: true,
            visible_line: String::new(),
        }
    }

    pub fn syntax(&self) -> &MarkerSyntax {
        &self.syntax
    }

    /// Whether text is currently held back.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Feed a decoded text chunk.
    pub fn push(&mut self, text: &str) -> Vec<ScanEvent> {
        self.pending.push_str(text);
        let mut events = Vec::new();
        self.drain(&mut events, false);
        events
    }

    /// Flush at end of stream.
    ///
    /// A buffered marker line without a terminator is still recognized;
    /// anything else is released verbatim.
    pub fn finish(&mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        self.drain(&mut events, true);
        if !self.visible_line.is_empty() {
            self.check_leaked_marker();
            self.visible_line.clear();
        }
        events
    }

    fn drain(&mut self, events: &mut Vec<ScanEvent>, at_end: bool) {
        loop {
            let Some(start) = self.find_opener() else {
                let keep_from = if at_end {
                    self.pending.len()
                } else {
                    self.partial_opener_start()
                };
                let visible: String = self.pending.drain(..keep_from).collect();
                self.emit_text(events, visible);
                return;
            };

            let before: String = self.pending.drain(..start).collect();
            self.emit_text(events, before);

            // `pending` now begins with a marker opener.
            let line_end = match self.pending.find('\n') {
                Some(newline) => newline + 1,
                None if at_end => self.pending.len(),
                None => return,
            };

            let line: String = self.pending.drain(..line_end).collect();
            let body = line.strip_suffix('\n').unwrap_or(&line);
            match self.syntax.parse_line(body) {
                Some(marker) => {
                    tracing::trace!(?marker, "Marker line recognized");
                    events.push(marker.into());
                    self.at_line_start = true;
                }
                None => self.emit_text(events, line),
            }
        }
    }

    /// Byte offsets in `pending` where a line begins.
    fn line_starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.at_line_start
            .then_some(0)
            .into_iter()
            .chain(self.pending.match_indices('\n').map(|(idx, _)| idx + 1))
    }

    /// Byte offset of the earliest complete opener that starts a line.
    fn find_opener(&self) -> Option<usize> {
        let openers = self.syntax.openers();
        self.line_starts().find(|&idx| {
            let rest = &self.pending[idx..];
            openers.iter().any(|opener| rest.starts_with(opener))
        })
    }

    /// Start of the line-initial suffix of `pending` that could still grow
    /// into an opener, or `pending.len()` if there is none.
    fn partial_opener_start(&self) -> usize {
        let openers = self.syntax.openers();
        self.line_starts()
            .filter(|&idx| idx < self.pending.len())
            .find(|&idx| {
                let tail = &self.pending[idx..];
                openers.iter().any(|opener| opener.starts_with(tail))
            })
            .unwrap_or(self.pending.len())
    }

    fn emit_text(&mut self, events: &mut Vec<ScanEvent>, text: String) {
        if text.is_empty() {
            return;
        }
        self.at_line_start = text.ends_with('\n');
        self.track_visible_lines(&text);
        match events.last_mut() {
            Some(ScanEvent::Text(previous)) => previous.push_str(&text),
            _ => events.push(ScanEvent::Text(text)),
        }
    }

    fn track_visible_lines(&mut self, text: &str) {
        for piece in text.split_inclusive('\n') {
            if self.visible_line.len() < DIAGNOSTIC_LINE_LIMIT {
                self.visible_line.push_str(piece);
            }
            if piece.ends_with('\n') {
                self.check_leaked_marker();
                self.visible_line.clear();
            }
        }
    }

    fn check_leaked_marker(&self) {
        let line = self.visible_line.trim_end();
        if self.syntax.looks_like_marker(line) {
            tracing::warn!(
                line = %line,
                start_token = %self.syntax.start_token(),
                end_token = %self.syntax.end_token(),
                "Marker-like line did not match the configured tool tokens"
            );
        }
    }
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new(MarkerSyntax::default())
    }
}
