//! Slash command parsing and the canned texts used by the REPL.

use crate::session::{Message, Role};

use super::completion::COMMANDS;

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Clear,
    History(Option<usize>),
    Advice,
    Status,
    Set { key: String, value: String },
    Settings,
    Quit,
    /// Well-formed command with bad arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

impl ReplCommand {
    /// Parse `input`; returns `None` for anything that is not a slash command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let rest = input.strip_prefix('/')?;
        let (cmd, args) = match rest.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd, args.trim()),
            None => (rest, ""),
        };

        let command = match cmd.to_lowercase().as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "clear" => ReplCommand::Clear,
            "history" => {
                if args.is_empty() {
                    ReplCommand::History(None)
                } else {
                    match args.parse::<usize>() {
                        Ok(n) => ReplCommand::History(Some(n)),
                        Err(_) => ReplCommand::Usage("/history [count]"),
                    }
                }
            }
            "advice" => ReplCommand::Advice,
            "status" => ReplCommand::Status,
            "set" => match args.split_once(char::is_whitespace) {
                Some((key, value)) if !value.trim().is_empty() => ReplCommand::Set {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                },
                _ => ReplCommand::Usage("/set <key> <value>"),
            },
            "settings" => ReplCommand::Settings,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => ReplCommand::Unknown(other.to_string()),
        };
        Some(command)
    }
}

/// Canned request asking the advisor to review the user's spending.
pub fn advice_prompt(language: &str) -> &'static str {
    if is_chinese(language) {
        "请根据我的交易记录，分析我的消费习惯并给出具体的财务建议。请包含：1. 主要支出类别分析 2. 异常消费提醒 3. 省钱建议。"
    } else {
        "Please analyze my spending habits based on my transaction records and give concrete financial advice. Include: 1. Analysis of the main spending categories 2. Alerts about unusual spending 3. Money-saving suggestions."
    }
}

pub fn clear_confirmation(language: &str) -> &'static str {
    if is_chinese(language) {
        "确定要清空所有对话历史吗？"
    } else {
        "Clear the entire conversation history?"
    }
}

fn is_chinese(language: &str) -> bool {
    language.to_lowercase().starts_with("zh")
}

pub fn help_text() -> String {
    let mut text = String::from("\n\x1b[1mCommands\x1b[0m\n\n");
    for (cmd, desc) in COMMANDS {
        text.push_str(&format!("  \x1b[36m{:<12}\x1b[0m {}\n", cmd, desc));
    }
    text.push_str("\n  \x1b[2mAnything else is sent to the advisor. Ctrl-C stops a running answer.\x1b[0m\n");
    text
}

/// Render stored messages for `/history`.
pub fn format_history(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "  (no messages)\n".to_string();
    }

    let mut text = String::new();
    for message in messages {
        let label = match message.role {
            Role::User => "\x1b[1;36myou\x1b[0m",
            Role::Assistant => "\x1b[1;33madvisor\x1b[0m",
        };
        text.push_str(&format!("  {} {}\n", label, message.content.trim_end()));
    }
    text
}
