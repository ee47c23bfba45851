//! Reedline completion, prompt and highlighting.
//!
//! Type "/" then Tab to see commands. `/set ` then Tab lists setting keys.

use std::borrow::Cow;
use std::path::PathBuf;

use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, Emacs, FileBackedHistory, Highlighter, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Span, StyledText, Suggestion,
};

use crate::config::KNOWN_KEYS;

/// All slash commands with descriptions
pub const COMMANDS: &[(&str, &str)] = &[
    ("/advice", "Ask for an analysis of your spending"),
    ("/clear", "Clear conversation history"),
    ("/exit", "Exit"),
    ("/help", "Show help"),
    ("/history", "Show recent messages"),
    ("/quit", "Exit"),
    ("/set", "Change a setting"),
    ("/settings", "List settings"),
    ("/status", "Show connection and history status"),
];

const HISTORY_SIZE: usize = 500;

/// Completer for slash commands and setting keys.
#[derive(Clone, Default)]
pub struct MchatCompleter;

impl MchatCompleter {
    pub fn new() -> Self {
        Self
    }
}

impl Completer for MchatCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if pos > line.len() || !line.is_char_boundary(pos) {
            return Vec::new();
        }

        let input = &line[..pos];
        if !input.starts_with('/') {
            return Vec::new();
        }

        if !input.contains(' ') {
            let prefix = input.to_lowercase();
            return COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(&prefix))
                .map(|(cmd, desc)| Suggestion {
                    value: cmd.to_string(),
                    description: Some(desc.to_string()),
                    extra: None,
                    span: Span::new(0, pos),
                    append_whitespace: true,
                    style: None,
                })
                .collect();
        }

        // Key completion: /set xxx
        if let Some(after) = input.strip_prefix("/set ") {
            if !after.contains(' ') {
                return KNOWN_KEYS
                    .iter()
                    .filter(|(key, _)| key.starts_with(after))
                    .map(|(key, desc)| Suggestion {
                        value: key.to_string(),
                        description: Some(desc.to_string()),
                        extra: None,
                        span: Span::new(5, pos),
                        append_whitespace: true,
                        style: None,
                    })
                    .collect();
            }
        }

        Vec::new()
    }
}

/// Prompt showing the conversation language and message count.
pub struct MchatPrompt {
    pub language: String,
    pub message_count: usize,
}

impl MchatPrompt {
    pub fn new(language: &str, message_count: usize) -> Self {
        Self {
            language: language.to_string(),
            message_count,
        }
    }
}

impl Prompt for MchatPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "\x1b[1;32mmoneychat\x1b[0m \x1b[2m[{} · {} msgs]\x1b[0m",
            self.language, self.message_count
        ))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed(" 💰 ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, hs: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match hs.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}search: {}) ", prefix, hs.term))
    }
}

/// Highlights known slash commands.
#[derive(Clone)]
pub struct MchatHighlighter;

impl Highlighter for MchatHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if line.starts_with('/') {
            let cmd_end = line.find(' ').unwrap_or(line.len());
            let cmd = &line[..cmd_end];
            let style = if is_complete_command(cmd) {
                Style::new().fg(Color::Cyan).bold()
            } else {
                Style::new().fg(Color::Yellow)
            };
            styled.push((style, cmd.to_string()));

            if cmd_end < line.len() {
                styled.push((Style::default(), line[cmd_end..].to_string()));
            }
        } else {
            styled.push((Style::default(), line.to_string()));
        }

        styled
    }
}

/// Create reedline with Tab-triggered completion and file-backed history.
pub fn create_reedline(history_path: Option<PathBuf>) -> Reedline {
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name("completion_menu")
            .with_columns(1)
            .with_column_padding(2)
            .with_text_style(Style::new().fg(Color::Default))
            .with_selected_text_style(Style::new().fg(Color::Black).on(Color::Cyan))
            .with_description_text_style(Style::new().fg(Color::DarkGray)),
    );

    let mut keybindings = reedline::default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(
        KeyModifiers::SHIFT,
        KeyCode::BackTab,
        ReedlineEvent::MenuPrevious,
    );

    let mut editor = Reedline::create()
        .with_completer(Box::new(MchatCompleter::new()))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_quick_completions(true)
        .with_partial_completions(true)
        .with_highlighter(Box::new(MchatHighlighter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    if let Some(path) = history_path {
        match FileBackedHistory::with_file(HISTORY_SIZE, path.clone()) {
            Ok(history) => editor = editor.with_history(Box::new(history)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not open REPL history"),
        }
    }

    editor
}

/// Whether `cmd` names a command exactly.
pub fn is_complete_command(cmd: &str) -> bool {
    COMMANDS.iter().any(|(c, _)| *c == cmd)
}

/// Show command picker using dialoguer FuzzySelect
pub fn pick_command(prefix: &str) -> Option<String> {
    use dialoguer::{theme::ColorfulTheme, FuzzySelect};

    let filtered: Vec<(&str, &str)> = COMMANDS
        .iter()
        .filter(|(cmd, _)| prefix.is_empty() || cmd.contains(&prefix.to_lowercase()))
        .copied()
        .collect();

    if filtered.is_empty() {
        return None;
    }

    let items: Vec<String> = filtered
        .iter()
        .map(|(cmd, desc)| format!("{:<12} {}", cmd, desc))
        .collect();

    FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Command")
        .items(&items)
        .default(0)
        .max_length(8)
        .interact_opt()
        .ok()
        .flatten()
        .map(|idx| filtered[idx].0.to_string())
}

/// Resolve a partially typed command; `None` means the user backed out.
pub fn try_complete_input(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') || trimmed.contains(' ') || is_complete_command(trimmed) {
        return Some(trimmed.to_string());
    }

    // Single unambiguous match needs no picker
    let matches: Vec<&str> = COMMANDS
        .iter()
        .map(|(cmd, _)| *cmd)
        .filter(|cmd| cmd.starts_with(trimmed))
        .collect();
    if let [only] = matches.as_slice() {
        return Some(only.to_string());
    }

    pick_command(&trimmed[1..])
}
