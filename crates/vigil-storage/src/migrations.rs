use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema. Idempotent.
///
/// # Errors
///
/// Returns an error if table or index creation fails.
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Usage ledger - one row per calendar day
    conn.execute(
        "CREATE TABLE IF NOT EXISTS usage_days (
            day TEXT PRIMARY KEY,
            seconds_used REAL NOT NULL,
            extension_seconds REAL NOT NULL DEFAULT 0,
            extensions_granted INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Finalized sessions with their summary columns
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            mode TEXT NOT NULL,
            total_seconds REAL NOT NULL,
            present_seconds REAL NOT NULL,
            away_seconds REAL NOT NULL,
            gadget_seconds REAL NOT NULL,
            screen_distraction_seconds REAL NOT NULL,
            paused_seconds REAL NOT NULL,
            focus_percentage REAL NOT NULL
        )",
        [],
    )?;

    // Event timeline of each archived session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_seconds REAL NOT NULL,
            metadata TEXT,
            FOREIGN KEY (session_id) REFERENCES sessions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time)",
        [],
    )?;

    Ok(())
}
