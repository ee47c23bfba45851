//! Resolved advisor configuration.

use std::time::Duration;

use super::Settings;
use crate::stream::{MarkerSyntax, DEFAULT_TOOL_END_TOKEN, DEFAULT_TOOL_START_TOKEN};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/api/chat";
pub const DEFAULT_LANGUAGE: &str = "zh";
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub language: Option<String>,
}

/// Everything the chat channel needs to talk to the advisor.
///
/// Precedence: overrides, then the settings table, then built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub endpoint: String,
    pub language: String,
    pub history_window: usize,
    pub connect_timeout: Duration,
    pub tool_start_token: String,
    pub tool_end_token: String,
}

impl ChatConfig {
    pub fn resolve(settings: &Settings<'_>, overrides: &ConfigOverrides) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: overrides
                .endpoint
                .clone()
                .or_else(|| settings.endpoint())
                .unwrap_or(defaults.endpoint),
            language: overrides
                .language
                .clone()
                .or_else(|| settings.language())
                .unwrap_or(defaults.language),
            history_window: settings
                .history_window()
                .unwrap_or(defaults.history_window),
            connect_timeout: settings
                .connect_timeout_secs()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            tool_start_token: settings
                .tool_start_token()
                .unwrap_or(defaults.tool_start_token),
            tool_end_token: settings
                .tool_end_token()
                .unwrap_or(defaults.tool_end_token),
        }
    }

    pub fn marker_syntax(&self) -> MarkerSyntax {
        MarkerSyntax::new(self.tool_start_token.as_str(), self.tool_end_token.as_str())
    }

    /// Whether responses are expected in Chinese.
    pub fn is_chinese(&self) -> bool {
        self.language.to_lowercase().starts_with("zh")
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            tool_start_token: DEFAULT_TOOL_START_TOKEN.to_string(),
            tool_end_token: DEFAULT_TOOL_END_TOKEN.to_string(),
        }
    }
}
