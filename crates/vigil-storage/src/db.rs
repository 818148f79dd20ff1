use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::migrations;
use crate::models::{DayTotals, StoredEvent, StoredSession, UsageDay};

/// Database connection wrapper. A single mutex serializes access so the
/// engine's workers and a CLI process-local reader never interleave
/// statements on the shared connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Create a new database connection.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation, connection opening, or schema
    /// initialization fails.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;
        migrations::init_schema(&conn)?;

        log::info!("Database initialized at: {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get default database path.
    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("vigil");
        path.push("vigil.db");
        path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Get the usage-ledger row for a day.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_usage_day(&self, day: NaiveDate) -> Result<Option<UsageDay>> {
        let conn = self.lock();
        let result = conn
            .query_row(
                "SELECT day, seconds_used, extension_seconds, extensions_granted
                 FROM usage_days WHERE day = ?1",
                params![day.format("%Y-%m-%d").to_string()],
                |row| {
                    let day_str: String = row.get(0)?;
                    Ok(UsageDay {
                        day: NaiveDate::parse_from_str(&day_str, "%Y-%m-%d")
                            .unwrap_or(NaiveDate::MIN),
                        seconds_used: row.get(1)?,
                        extension_seconds: row.get(2)?,
                        extensions_granted: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    /// Insert or update a usage-ledger row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database upsert fails.
    pub fn upsert_usage_day(&self, usage: &UsageDay) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO usage_days (day, seconds_used, extension_seconds, extensions_granted)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(day) DO UPDATE SET
                seconds_used = ?2,
                extension_seconds = ?3,
                extensions_granted = ?4",
            params![
                usage.day.format("%Y-%m-%d").to_string(),
                usage.seconds_used,
                usage.extension_seconds,
                usage.extensions_granted,
            ],
        )?;
        Ok(())
    }

    /// Add extension seconds to a day's row, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn add_extension(&self, day: NaiveDate, seconds: f64) -> Result<UsageDay> {
        let mut usage = self.get_usage_day(day)?.unwrap_or_else(|| UsageDay::empty(day));
        usage.extension_seconds += seconds;
        usage.extensions_granted += 1;
        self.upsert_usage_day(&usage)?;
        log::info!("granted {seconds:.0}s extension for {day}");
        Ok(usage)
    }

    /// Archive a finalized session and its event timeline atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn archive_session(&self, session: &StoredSession, events: &[StoredEvent]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO sessions (id, start_time, end_time, mode, total_seconds,
                                   present_seconds, away_seconds, gadget_seconds,
                                   screen_distraction_seconds, paused_seconds, focus_percentage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session.id.to_string(),
                session.start_time.to_rfc3339(),
                session.end_time.to_rfc3339(),
                session.mode,
                session.total_seconds,
                session.present_seconds,
                session.away_seconds,
                session.gadget_seconds,
                session.screen_distraction_seconds,
                session.paused_seconds,
                session.focus_percentage,
            ],
        )?;

        for event in events {
            tx.execute(
                "INSERT INTO events (session_id, event_type, start_time, end_time,
                                     duration_seconds, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.session_id.to_string(),
                    event.event_type,
                    event.start_time,
                    event.end_time,
                    event.duration_seconds,
                    event.metadata,
                ],
            )?;
        }

        tx.commit()?;
        log::debug!("archived session {} ({} events)", session.id, events.len());
        Ok(())
    }

    /// Get sessions that started within a time range, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_sessions(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<StoredSession>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, start_time, end_time, mode, total_seconds, present_seconds,
                    away_seconds, gadget_seconds, screen_distraction_seconds,
                    paused_seconds, focus_percentage
             FROM sessions
             WHERE start_time >= ?1 AND start_time <= ?2
             ORDER BY start_time ASC",
        )?;

        let sessions = stmt
            .query_map(params![start.to_rfc3339(), end.to_rfc3339()], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Get one archived session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_session(&self, id: uuid::Uuid) -> Result<Option<StoredSession>> {
        let conn = self.lock();
        let result = conn
            .query_row(
                "SELECT id, start_time, end_time, mode, total_seconds, present_seconds,
                        away_seconds, gadget_seconds, screen_distraction_seconds,
                        paused_seconds, focus_percentage
                 FROM sessions WHERE id = ?1",
                params![id.to_string()],
                Self::row_to_session,
            )
            .optional()?;
        Ok(result)
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<StoredSession> {
        Ok(StoredSession {
            id: uuid::Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
            start_time: parse_rfc3339(&row.get::<_, String>(1)?),
            end_time: parse_rfc3339(&row.get::<_, String>(2)?),
            mode: row.get(3)?,
            total_seconds: row.get(4)?,
            present_seconds: row.get(5)?,
            away_seconds: row.get(6)?,
            gadget_seconds: row.get(7)?,
            screen_distraction_seconds: row.get(8)?,
            paused_seconds: row.get(9)?,
            focus_percentage: row.get(10)?,
        })
    }

    /// Get the event timeline of an archived session, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_events(&self, session_id: uuid::Uuid) -> Result<Vec<StoredEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT session_id, event_type, start_time, end_time, duration_seconds, metadata
             FROM events
             WHERE session_id = ?1
             ORDER BY start_time ASC",
        )?;

        let events = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok(StoredEvent {
                    session_id: uuid::Uuid::parse_str(&row.get::<_, String>(0)?)
                        .unwrap_or_default(),
                    event_type: row.get(1)?,
                    start_time: row.get(2)?,
                    end_time: row.get(3)?,
                    duration_seconds: row.get(4)?,
                    metadata: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Aggregate totals for one calendar day (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn day_totals(&self, day: NaiveDate) -> Result<DayTotals> {
        let day_start = format!("{}T00:00:00", day.format("%Y-%m-%d"));
        let day_end = format!("{}T23:59:59.999999999", day.format("%Y-%m-%d"));

        let conn = self.lock();
        let totals = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(total_seconds), 0),
                    COALESCE(SUM(present_seconds), 0),
                    COALESCE(SUM(away_seconds + gadget_seconds + screen_distraction_seconds), 0),
                    COALESCE(SUM(paused_seconds), 0)
             FROM sessions
             WHERE start_time >= ?1 AND start_time <= ?2",
            params![day_start, day_end],
            |row| {
                Ok(DayTotals {
                    sessions: row.get(0)?,
                    total_seconds: row.get(1)?,
                    present_seconds: row.get(2)?,
                    distracted_seconds: row.get(3)?,
                    paused_seconds: row.get(4)?,
                })
            },
        )?;
        Ok(totals)
    }
}

fn parse_rfc3339(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(Some(dir.path().join("test.db"))).unwrap();
        (dir, db)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn sample_session(start_hour: u32) -> StoredSession {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, start_hour, 0, 0).unwrap();
        StoredSession {
            id: uuid::Uuid::new_v4(),
            start_time: start,
            end_time: start + chrono::Duration::seconds(900),
            mode: String::from("both"),
            total_seconds: 900.0,
            present_seconds: 600.0,
            away_seconds: 120.0,
            gadget_seconds: 60.0,
            screen_distraction_seconds: 60.0,
            paused_seconds: 60.0,
            focus_percentage: 71.4,
        }
    }

    #[test]
    fn usage_day_round_trips() {
        let (_dir, db) = temp_db();
        assert!(db.get_usage_day(day(1)).unwrap().is_none());

        let usage = UsageDay {
            day: day(1),
            seconds_used: 1234.5,
            extension_seconds: 600.0,
            extensions_granted: 1,
        };
        db.upsert_usage_day(&usage).unwrap();
        assert_eq!(db.get_usage_day(day(1)).unwrap(), Some(usage.clone()));

        // Upsert replaces, not duplicates.
        let updated = UsageDay {
            seconds_used: 2000.0,
            ..usage
        };
        db.upsert_usage_day(&updated).unwrap();
        assert_eq!(db.get_usage_day(day(1)).unwrap(), Some(updated));
    }

    #[test]
    fn add_extension_creates_the_row_when_missing() {
        let (_dir, db) = temp_db();
        let usage = db.add_extension(day(2), 1800.0).unwrap();
        assert!((usage.extension_seconds - 1800.0).abs() < f64::EPSILON);
        assert_eq!(usage.extensions_granted, 1);

        let usage = db.add_extension(day(2), 600.0).unwrap();
        assert!((usage.extension_seconds - 2400.0).abs() < f64::EPSILON);
        assert_eq!(usage.extensions_granted, 2);
    }

    #[test]
    fn archived_session_and_events_round_trip() {
        let (_dir, db) = temp_db();
        let session = sample_session(9);
        let events = vec![
            StoredEvent {
                session_id: session.id,
                event_type: String::from("present"),
                start_time: session.start_time.to_rfc3339(),
                end_time: (session.start_time + chrono::Duration::seconds(600)).to_rfc3339(),
                duration_seconds: 600.0,
                metadata: None,
            },
            StoredEvent {
                session_id: session.id,
                event_type: String::from("screen_distraction"),
                start_time: (session.start_time + chrono::Duration::seconds(600)).to_rfc3339(),
                end_time: session.end_time.to_rfc3339(),
                duration_seconds: 300.0,
                metadata: Some(String::from("Website: youtube.com")),
            },
        ];
        db.archive_session(&session, &events).unwrap();

        let loaded = db.get_session(session.id).unwrap().expect("session stored");
        assert_eq!(loaded.mode, "both");
        assert!((loaded.present_seconds - 600.0).abs() < f64::EPSILON);

        let loaded_events = db.get_events(session.id).unwrap();
        assert_eq!(loaded_events.len(), 2);
        assert_eq!(loaded_events[0].event_type, "present");
        assert_eq!(
            loaded_events[1].metadata.as_deref(),
            Some("Website: youtube.com")
        );
    }

    #[test]
    fn day_totals_aggregate_across_sessions() {
        let (_dir, db) = temp_db();
        db.archive_session(&sample_session(9), &[]).unwrap();
        db.archive_session(&sample_session(14), &[]).unwrap();

        let totals = db.day_totals(day(1)).unwrap();
        assert_eq!(totals.sessions, 2);
        assert!((totals.present_seconds - 1200.0).abs() < f64::EPSILON);
        assert!((totals.distracted_seconds - 480.0).abs() < f64::EPSILON);

        let empty = db.day_totals(day(2)).unwrap();
        assert_eq!(empty.sessions, 0);
        assert!((empty.total_seconds - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sessions_query_filters_by_range() {
        let (_dir, db) = temp_db();
        db.archive_session(&sample_session(9), &[]).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        assert_eq!(db.get_sessions(start, end).unwrap().len(), 1);

        let next_day = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let next_day_end = Utc.with_ymd_and_hms(2024, 6, 2, 23, 59, 59).unwrap();
        assert!(db.get_sessions(next_day, next_day_end).unwrap().is_empty());
    }
}
