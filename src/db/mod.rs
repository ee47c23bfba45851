//! SQLite database for settings and the durable key-value store.

mod kv;
mod migrations;

use rusqlite::Connection;
use std::path::PathBuf;

use crate::config::XdgDirs;

pub use kv::{KeyValueStore, KvError, MemoryKvStore};

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open the database at the default location.
    pub fn open() -> anyhow::Result<Self> {
        let path = Self::default_path();
        Self::open_at(path)
    }

    /// Open the database at a specific path.
    pub fn open_at(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;

        // Conversation history is personal financial data; keep it private.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            {
                tracing::warn!("Failed to set database file permissions: {}", e);
            }
        }

        // The CLI and the chat actor each hold a connection.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        Ok(Self { conn, path })
    }

    /// Get the default database path.
    pub fn default_path() -> PathBuf {
        XdgDirs::new().database_path()
    }

    /// Run database migrations.
    pub fn migrate(&self) -> anyhow::Result<()> {
        migrations::run_migrations(&self.conn)
    }

    /// Open a second connection to the same file.
    pub fn reopen(&self) -> anyhow::Result<Self> {
        Self::open_at(self.path.clone())
    }

    /// Get a reference to the connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the database path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
