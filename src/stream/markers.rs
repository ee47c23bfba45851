//! Tool-marker grammar shared with the advisor backend.
//!
//! The backend announces tool calls by writing whole lines into the text
//! stream:
//!
//! ```text
//! > 🔧 调用工具: python_repl_ast
//! > ✅ 工具 python_repl_ast 执行完毕
//! ```
//!
//! The tokens must match the backend byte-for-byte. A mismatch does not fail
//! anything; the raw marker lines simply leak into the visible text.

use regex::Regex;

/// Prefix every marker line starts with.
pub const MARKER_PREFIX: &str = "> ";

/// Token following the prefix on a tool-start line.
pub const DEFAULT_TOOL_START_TOKEN: &str = "🔧 调用工具";

/// Token following the prefix on a tool-end line.
pub const DEFAULT_TOOL_END_TOKEN: &str = "✅ 工具";

/// A recognized control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Start { name: String },
    End,
}

/// Compiled marker grammar.
#[derive(Debug, Clone)]
pub struct MarkerSyntax {
    start_token: String,
    end_token: String,
    start_opener: String,
    end_opener: String,
    start_line: Regex,
    end_line: Regex,
}

impl MarkerSyntax {
    /// Build a grammar from the two backend tokens.
    pub fn new(start_token: impl Into<String>, end_token: impl Into<String>) -> Self {
        let start_token = start_token.into();
        let end_token = end_token.into();

        let start_opener = format!("{}{}: ", MARKER_PREFIX, start_token);
        let end_opener = format!("{}{}", MARKER_PREFIX, end_token);

        let start_line = Regex::new(&format!("^{}(.+)$", regex::escape(&start_opener)))
            .expect("escaped marker literal is a valid pattern");
        let end_line = Regex::new(&format!("^{}.*$", regex::escape(&end_opener)))
            .expect("escaped marker literal is a valid pattern");

        Self {
            start_token,
            end_token,
            start_opener,
            end_opener,
            start_line,
            end_line,
        }
    }

    pub fn start_token(&self) -> &str {
        &self.start_token
    }

    pub fn end_token(&self) -> &str {
        &self.end_token
    }

    /// Literal text that begins a tool-start line (`"> 🔧 调用工具: "`).
    pub fn start_opener(&self) -> &str {
        &self.start_opener
    }

    /// Literal text that begins a tool-end line (`"> ✅ 工具"`).
    pub fn end_opener(&self) -> &str {
        &self.end_opener
    }

    /// Both openers, start first.
    pub fn openers(&self) -> [&str; 2] {
        [self.start_opener.as_str(), self.end_opener.as_str()]
    }

    /// Parse one complete line (without its terminator).
    ///
    /// A start line whose tool name is blank is not a marker.
    pub fn parse_line(&self, line: &str) -> Option<Marker> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(caps) = self.start_line.captures(line) {
            let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            return Some(Marker::Start {
                name: name.to_string(),
            });
        }

        if self.end_line.is_match(line) {
            return Some(Marker::End);
        }

        None
    }

    /// Whether a visible line resembles a marker the grammar did not accept.
    ///
    /// Used only for diagnostics: a backend that changed its tokens shows up
    /// here as leaked lines.
    pub fn looks_like_marker(&self, line: &str) -> bool {
        let Some(rest) = line.trim_start().strip_prefix(MARKER_PREFIX) else {
            return false;
        };
        [&self.start_token, &self.end_token]
            .iter()
            .filter_map(|token| token.chars().next())
            .any(|glyph| rest.contains(glyph))
    }
}

impl Default for MarkerSyntax {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_START_TOKEN, DEFAULT_TOOL_END_TOKEN)
    }
}
