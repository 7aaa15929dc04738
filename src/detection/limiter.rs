//! Bounded access to blocking database handles
//!
//! SQLite and the MaxMind reader are blocking. Work against them runs on
//! tokio's blocking pool, gated by a counting semaphore so that no more than
//! the configured number of operations hold a handle at once.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Errors from running work through a [`ConnectionLimiter`]
#[derive(Error, Debug)]
pub enum LimiterError {
    #[error("connection limiter '{0}' is closed")]
    Closed(&'static str),

    #[error("blocking task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

/// Counting semaphore in front of a blocking resource
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    name: &'static str,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ConnectionLimiter {
    /// Create a limiter; `max_connections` is capped at `Semaphore::MAX_PERMITS`
    pub fn new(name: &'static str, max_connections: usize) -> Self {
        let max_connections = max_connections.min(Semaphore::MAX_PERMITS);
        ConnectionLimiter {
            name,
            semaphore: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Run `task` on the blocking pool once a slot is free
    ///
    /// The permit travels with the task and is released when the task ends,
    /// however it ends. Dropping the returned future does not cancel work
    /// that has already started.
    pub async fn run_blocking<F, T>(&self, task: F) -> Result<T, LimiterError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed(self.name))?;

        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            task()
        })
        .await?;

        Ok(output)
    }

    /// Number of slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Stop handing out slots; pending and future calls fail with `Closed`
    pub fn close(&self) {
        self.semaphore.close();
    }
}
