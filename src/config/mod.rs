//! Configuration management.

mod chat;
mod settings;
mod xdg;

pub use chat::{
    ChatConfig, ConfigOverrides, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT,
    DEFAULT_HISTORY_WINDOW, DEFAULT_LANGUAGE,
};
pub use settings::{
    Settings, SettingsError, KEY_CONNECT_TIMEOUT, KEY_ENDPOINT, KEY_HISTORY_WINDOW, KEY_LANGUAGE,
    KEY_TOOL_END, KEY_TOOL_START, KNOWN_KEYS,
};
pub use xdg::XdgDirs;
