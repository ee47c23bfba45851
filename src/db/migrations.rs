//! Database migrations.

use rusqlite::Connection;

/// Ordered migrations; names are recorded once applied.
const MIGRATIONS: &[(&str, &str)] = &[("001_initial", include_str!("sql/001_initial.sql"))];

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER DEFAULT (unixepoch())
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
            [*name],
            |row| row.get(0),
        )?;

        if !applied {
            tracing::info!(migration = *name, "Running migration");
            conn.execute_batch(sql)?;
            conn.execute("INSERT INTO migrations (name) VALUES (?)", [*name])?;
        }
    }

    Ok(())
}
