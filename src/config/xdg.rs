//! XDG Base Directory support.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "moneychat";

/// XDG directory paths for moneychat.
pub struct XdgDirs {
    /// Data directory (~/.local/share/moneychat or XDG_DATA_HOME/moneychat)
    pub data: PathBuf,
    /// State directory (~/.local/state/moneychat or XDG_STATE_HOME/moneychat)
    pub state: PathBuf,
}

impl XdgDirs {
    /// Get XDG directories, respecting environment variables.
    pub fn new() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve directories through an arbitrary variable lookup.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let resolve = |var: &str, fallback: &str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(fallback))
                .join(APP_DIR)
        };

        Self {
            data: resolve("XDG_DATA_HOME", ".local/share"),
            state: resolve("XDG_STATE_HOME", ".local/state"),
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.data, &self.state] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Default SQLite database location.
    pub fn database_path(&self) -> PathBuf {
        self.data.join("moneychat.db")
    }

    /// Line-editor history file.
    pub fn repl_history_path(&self) -> PathBuf {
        self.state.join("repl_history.txt")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}
