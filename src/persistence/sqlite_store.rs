//! SQLite implementation of the EventStore trait

use super::{EventStore, InsertOutcome, PersistenceError};
use crate::models::{Event, EventInfo};
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based event storage
///
/// Events live in a single `events` table keyed by their UUID. The
/// connection is shared behind a mutex; callers bound concurrency further
/// with a [`ConnectionLimiter`](crate::detection::ConnectionLimiter).
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) the event database at the specified path
    ///
    /// Creates the database file and initializes the schema if it doesn't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(SqliteEventStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn insert_with(conn: &Connection, events: &[Event]) -> Result<Vec<InsertOutcome>, PersistenceError> {
        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO events (uuid, username, timestamp, ip) VALUES (?, ?, ?, ?)",
        )?;

        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            let rows_written = stmt.execute(params![
                event.id().to_string(),
                event.username(),
                event.timestamp(),
                event.source_ip().to_string()
            ])?;
            outcomes.push(InsertOutcome {
                event_id: event.id(),
                rows_written,
            });
        }

        Ok(outcomes)
    }

    fn scan_with(conn: &Connection, username: &str) -> Result<Vec<Event>, PersistenceError> {
        let mut stmt = conn.prepare_cached(
            "SELECT uuid, username, timestamp, ip FROM events
             WHERE username = ?
             ORDER BY timestamp ASC, uuid ASC",
        )?;

        let rows = stmt
            .query_map(params![username], |row| {
                Ok(EventInfo {
                    uuid: row.get(0)?,
                    username: row.get(1)?,
                    timestamp: row.get(2)?,
                    ip: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|info| {
                Event::new(info).map_err(|e| PersistenceError::InvalidData(e.to_string()))
            })
            .collect()
    }
}

impl EventStore for SqliteEventStore {
    fn insert(&self, events: &[Event]) -> Result<Vec<InsertOutcome>, PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcomes = Self::insert_with(&tx, events)?;
        tx.commit()?;
        Ok(outcomes)
    }

    fn scan_by_user(&self, username: &str) -> Result<Vec<Event>, PersistenceError> {
        let conn = self.lock()?;
        Self::scan_with(&conn, username)
    }

    fn insert_and_scan(&self, event: &Event) -> Result<Vec<Event>, PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Self::insert_with(&tx, std::slice::from_ref(event))?;
        let events = Self::scan_with(&tx, event.username())?;
        tx.commit()?;
        Ok(events)
    }
}
