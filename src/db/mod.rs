//! Lazily connected database access.
//!
//! [`ConnectionGuard`] wraps a [`Connector`] and opens the connection on first
//! use. However many tasks make their first call at the same time, only one
//! connection attempt runs; the others wait for it and share its result.
//!
//! ```text
//! Idle ──first call──▶ Connecting ──ok──▶ Ready ──disconnect──▶ Idle
//!                          │
//!                          └──error or cancelled──▶ Idle
//! ```
//!
//! A failed attempt leaves the guard idle, so the next call tries again.
//! Callers that were waiting on a failed attempt start a new one; it is still
//! single-flight.

pub mod query;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

pub use query::{BuiltQuery, Query};

/// A result row: column name to value.
pub type Row = Map<String, Value>;

/// An open database connection.
pub trait Connection: Send + Sync {
    /// Run a query and return every row.
    fn fetch_all_rows<'a>(&'a self, query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<Vec<Row>>>;

    /// Run a query and return its first row, if any.
    fn fetch_row<'a>(&'a self, query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<Option<Row>>>;

    /// Run a statement and return the number of affected rows.
    fn execute<'a>(&'a self, query: &'a BuiltQuery) -> BoxFuture<'a, anyhow::Result<u64>>;

    /// Close the connection.
    fn close(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Opens connections.
pub trait Connector: Send + Sync {
    /// Connection type produced.
    type Connection: Connection + 'static;

    /// Open one connection.
    fn connect(&self) -> BoxFuture<'_, anyhow::Result<Self::Connection>>;
}

enum GuardState<C> {
    Idle,
    Connecting(Arc<Notify>),
    Ready(Arc<C>),
}

/// Single-flight lazy connection around a [`Connector`].
pub struct ConnectionGuard<K: Connector> {
    connector: K,
    state: Mutex<GuardState<K::Connection>>,
    attempts: AtomicUsize,
}

impl<K: Connector> std::fmt::Debug for ConnectionGuard<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("connected", &self.is_connected())
            .field("attempts", &self.connect_attempts())
            .finish_non_exhaustive()
    }
}

enum Turn {
    Wait(Arc<Notify>),
    Lead(Arc<Notify>),
}

/// Puts the guard back to idle if the leading attempt is dropped mid-flight.
struct AttemptReset<'a, C> {
    state: &'a Mutex<GuardState<C>>,
    notify: Arc<Notify>,
    armed: bool,
}

impl<C> Drop for AttemptReset<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            *lock(self.state) = GuardState::Idle;
            self.notify.notify_waiters();
        }
    }
}

fn lock<C>(state: &Mutex<GuardState<C>>) -> MutexGuard<'_, GuardState<C>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K: Connector> ConnectionGuard<K> {
    /// Wrap `connector`. Nothing connects until the first query.
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            state: Mutex::new(GuardState::Idle),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Whether a connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(*lock(&self.state), GuardState::Ready(_))
    }

    /// How many connection attempts have been started.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The open connection, connecting first if needed.
    ///
    /// # Errors
    ///
    /// The connector's error if this call led a failed attempt.
    pub async fn connection(&self) -> anyhow::Result<Arc<K::Connection>> {
        loop {
            let in_flight = {
                let mut state = lock(&self.state);
                match &*state {
                    GuardState::Ready(conn) => return Ok(Arc::clone(conn)),
                    GuardState::Connecting(notify) => Turn::Wait(Arc::clone(notify)),
                    GuardState::Idle => {
                        let notify = Arc::new(Notify::new());
                        *state = GuardState::Connecting(Arc::clone(&notify));
                        Turn::Lead(notify)
                    }
                }
            };
            let in_flight = match in_flight {
                Turn::Wait(notify) => notify,
                Turn::Lead(notify) => return self.lead(notify).await,
            };

            let notified = in_flight.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let still_connecting = matches!(
                &*lock(&self.state),
                GuardState::Connecting(current) if Arc::ptr_eq(current, &in_flight)
            );
            if still_connecting {
                notified.await;
            }
        }
    }

    async fn lead(&self, notify: Arc<Notify>) -> anyhow::Result<Arc<K::Connection>> {
        let mut reset = AttemptReset {
            state: &self.state,
            notify: Arc::clone(&notify),
            armed: true,
        };
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(target: "islet::db", "opening connection (attempt {})", attempt);

        let result = self.connector.connect().await;
        let outcome = {
            let mut state = lock(&self.state);
            match result {
                Ok(conn) => {
                    let conn = Arc::new(conn);
                    *state = GuardState::Ready(Arc::clone(&conn));
                    Ok(conn)
                }
                Err(e) => {
                    *state = GuardState::Idle;
                    Err(e)
                }
            }
        };
        reset.armed = false;
        notify.notify_waiters();
        outcome
    }

    /// Run `query` and return every row.
    ///
    /// # Errors
    ///
    /// Query building, connection or driver errors.
    pub async fn fetch_all_rows(&self, query: &Query) -> anyhow::Result<Vec<Row>> {
        let built = query.build()?;
        self.connection().await?.fetch_all_rows(&built).await
    }

    /// Run `query` and return its first row.
    ///
    /// # Errors
    ///
    /// Query building, connection or driver errors.
    pub async fn fetch_row(&self, query: &Query) -> anyhow::Result<Option<Row>> {
        let built = query.build()?;
        self.connection().await?.fetch_row(&built).await
    }

    /// Run a statement.
    ///
    /// # Errors
    ///
    /// Query building, connection or driver errors.
    pub async fn execute(&self, query: &Query) -> anyhow::Result<u64> {
        let built = query.build()?;
        self.connection().await?.execute(&built).await
    }

    /// Close the connection if one is open. The next query reconnects.
    ///
    /// # Errors
    ///
    /// The connection's close error.
    pub async fn disconnect(&self) -> anyhow::Result<()> {
        let open = {
            let mut state = lock(&self.state);
            match std::mem::replace(&mut *state, GuardState::Idle) {
                GuardState::Ready(conn) => Some(conn),
                other => {
                    *state = other;
                    None
                }
            }
        };
        if let Some(conn) = open {
            debug!(target: "islet::db", "closing connection");
            conn.close().await?;
        }
        Ok(())
    }
}
