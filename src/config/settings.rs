//! Settings management via SQLite.

use crate::db::Database;
use thiserror::Error;

/// Advisor chat endpoint URL.
pub const KEY_ENDPOINT: &str = "advisor.endpoint";
/// Language code sent with each request.
pub const KEY_LANGUAGE: &str = "advisor.language";
/// Number of prior messages sent as context.
pub const KEY_HISTORY_WINDOW: &str = "advisor.history_window";
/// Connect timeout for the advisor, in seconds.
pub const KEY_CONNECT_TIMEOUT: &str = "advisor.connect_timeout_secs";
/// Token of the tool-start marker line.
pub const KEY_TOOL_START: &str = "markers.tool_start";
/// Token of the tool-end marker line.
pub const KEY_TOOL_END: &str = "markers.tool_end";

/// Keys accepted by [`Settings::set_checked`], with a short description.
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    (KEY_ENDPOINT, "advisor chat endpoint URL"),
    (KEY_LANGUAGE, "response language code (zh, en)"),
    (KEY_HISTORY_WINDOW, "prior messages sent as context"),
    (KEY_CONNECT_TIMEOUT, "connect timeout in seconds"),
    (KEY_TOOL_START, "tool-start marker token"),
    (KEY_TOOL_END, "tool-end marker token"),
];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Settings manager backed by SQLite.
pub struct Settings<'a> {
    db: &'a Database,
}

impl<'a> Settings<'a> {
    /// Create a new settings manager.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Get a setting value.
    pub fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let result: Result<String, _> =
            self.db
                .conn()
                .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                    row.get(0)
                });

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SettingsError::Database(e)),
        }
    }

    /// Get a setting value or return a default.
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    /// Get a numeric setting; unparseable values are treated as unset.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).ok().flatten()?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
                None
            }
        }
    }

    /// Set a setting value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.db.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, unixepoch())
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, value],
        )?;
        Ok(())
    }

    /// Validate a user-supplied value for a known key, then store it.
    pub fn set_checked(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        validate(key, value)?;
        self.set(key, value.trim())
    }

    /// Delete a setting.
    pub fn delete(&self, key: &str) -> Result<(), SettingsError> {
        self.db
            .conn()
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(())
    }

    /// List all settings.
    pub fn list(&self) -> Result<Vec<(String, String)>, SettingsError> {
        let mut stmt = self
            .db
            .conn()
            .prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    // Typed accessors; `None` means "use the built-in default".

    pub fn endpoint(&self) -> Option<String> {
        self.get(KEY_ENDPOINT).ok().flatten()
    }

    pub fn language(&self) -> Option<String> {
        self.get(KEY_LANGUAGE).ok().flatten()
    }

    pub fn history_window(&self) -> Option<usize> {
        self.get_parsed(KEY_HISTORY_WINDOW)
    }

    pub fn connect_timeout_secs(&self) -> Option<u64> {
        self.get_parsed(KEY_CONNECT_TIMEOUT)
    }

    pub fn tool_start_token(&self) -> Option<String> {
        self.get(KEY_TOOL_START).ok().flatten()
    }

    pub fn tool_end_token(&self) -> Option<String> {
        self.get(KEY_TOOL_END).ok().flatten()
    }
}

fn validate(key: &str, value: &str) -> Result<(), SettingsError> {
    let value = value.trim();
    let invalid = |reason: &str| SettingsError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    match key {
        KEY_ENDPOINT => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid("must start with http:// or https://"));
            }
        }
        KEY_LANGUAGE | KEY_TOOL_START | KEY_TOOL_END => {
            if value.is_empty() {
                return Err(invalid("must not be empty"));
            }
        }
        KEY_HISTORY_WINDOW => {
            value
                .parse::<usize>()
                .map_err(|_| invalid("must be a non-negative integer"))?;
        }
        KEY_CONNECT_TIMEOUT => match value.parse::<u64>() {
            Ok(secs) if secs > 0 => {}
            _ => return Err(invalid("must be a positive integer")),
        },
        other => return Err(SettingsError::UnknownKey(other.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_at(temp_dir.path().join("settings.db")).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    #[test]
    fn test_get_set_delete() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        assert_eq!(settings.get("x").unwrap(), None);
        settings.set("x", "1").unwrap();
        settings.set("x", "2").unwrap();
        assert_eq!(settings.get("x").unwrap(), Some("2".to_string()));

        settings.delete("x").unwrap();
        assert_eq!(settings.get("x").unwrap(), None);
        assert_eq!(settings.get_or("x", "fallback"), "fallback");
    }

    #[test]
    fn test_list_sorted() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        settings.set(KEY_LANGUAGE, "en").unwrap();
        settings.set(KEY_ENDPOINT, "http://localhost:9000/api/chat").unwrap();

        let keys: Vec<String> = settings.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![KEY_ENDPOINT.to_string(), KEY_LANGUAGE.to_string()]);
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    #[test]
    fn test_typed_accessors_default_to_none() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        assert_eq!(settings.endpoint(), None);
        assert_eq!(settings.language(), None);
        assert_eq!(settings.history_window(), None);
        assert_eq!(settings.connect_timeout_secs(), None);
        assert_eq!(settings.tool_start_token(), None);
        assert_eq!(settings.tool_end_token(), None);
    }

    #[test]
    fn test_numeric_accessors_parse() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        settings.set(KEY_HISTORY_WINDOW, " 4 ").unwrap();
        settings.set(KEY_CONNECT_TIMEOUT, "15").unwrap();

        assert_eq!(settings.history_window(), Some(4));
        assert_eq!(settings.connect_timeout_secs(), Some(15));
    }

    #[test]
    fn test_unparseable_numeric_is_ignored() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        settings.set(KEY_HISTORY_WINDOW, "ten").unwrap();
        assert_eq!(settings.history_window(), None);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_set_checked_accepts_valid_values() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        settings
            .set_checked(KEY_ENDPOINT, "https://advisor.example/api/chat")
            .unwrap();
        settings.set_checked(KEY_HISTORY_WINDOW, "0").unwrap();
        settings.set_checked(KEY_TOOL_START, "🔧 Calling tool").unwrap();

        assert_eq!(settings.history_window(), Some(0));
        assert_eq!(settings.tool_start_token(), Some("🔧 Calling tool".to_string()));
    }

    #[test]
    fn test_set_checked_rejects_invalid_values() {
        let (_temp, db) = setup_test_db();
        let settings = Settings::new(&db);

        assert!(matches!(
            settings.set_checked(KEY_ENDPOINT, "ftp://nope"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            settings.set_checked(KEY_CONNECT_TIMEOUT, "0"),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            settings.set_checked(KEY_LANGUAGE, "   "),
            Err(SettingsError::Invalid { .. })
        ));
        assert!(matches!(
            settings.set_checked("advisor.colour", "blue"),
            Err(SettingsError::UnknownKey(_))
        ));

        assert!(settings.list().unwrap().is_empty());
    }

    #[test]
    fn test_known_keys_all_validate() {
        for (key, _) in KNOWN_KEYS {
            assert!(
                !matches!(validate(key, "1"), Err(SettingsError::UnknownKey(_))),
                "{} should be a known key",
                key
            );
        }
    }
}
