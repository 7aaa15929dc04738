//! Persistence module for event storage
//!
//! This module provides durable, deduplicated storage of access events,
//! queryable by user. Events are keyed by id: storing an id twice keeps the
//! first copy.

pub mod sqlite_store;

pub use sqlite_store::SqliteEventStore;

use crate::models::Event;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid data in database: {0}")]
    InvalidData(String),

    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

/// Result of inserting one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub event_id: Uuid,
    /// Rows actually written; 0 when the id was already stored
    pub rows_written: usize,
}

impl InsertOutcome {
    pub fn written(&self) -> bool {
        self.rows_written > 0
    }
}

/// Trait for event storage backends
pub trait EventStore: Send + Sync {
    /// Store events, ignoring ids that already exist
    ///
    /// Returns one outcome per input event, in input order.
    fn insert(&self, events: &[Event]) -> Result<Vec<InsertOutcome>, PersistenceError>;

    /// All stored events for a user, oldest first
    fn scan_by_user(&self, username: &str) -> Result<Vec<Event>, PersistenceError>;

    /// Store an event and return every stored event of its user
    ///
    /// Insert and scan happen atomically on one connection, so the result
    /// always contains the event just inserted (or the copy stored earlier
    /// under the same id).
    fn insert_and_scan(&self, event: &Event) -> Result<Vec<Event>, PersistenceError>;
}
