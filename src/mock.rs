//! Mock connection implementation for testing purposes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::BoxError;
use crate::conn::{Connect, PoolableConnection};

/// What a [`MockConnection`] does when its liveness probe is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ping {
    /// The probe succeeds and changes nothing.
    #[default]
    Noop,

    /// The probe finds the connection dead and flips its aliveness flag.
    Dies,

    /// The probe must never be issued; panics if it is.
    Untouchable,
}

/// A scriptable connection for exercising pool behavior.
#[derive(Debug)]
pub struct MockConnection {
    server: String,
    alive: bool,
    idle_at: Instant,
    ping: Ping,
    pings: usize,
    closed: bool,
    close_flag: Option<Arc<AtomicBool>>,
}

impl MockConnection {
    /// Create a healthy connection for `server` that became idle just now.
    pub fn new(server: &str) -> Self {
        Self {
            server: server.to_owned(),
            alive: true,
            idle_at: Instant::now(),
            ping: Ping::Noop,
            pings: 0,
            closed: false,
            close_flag: None,
        }
    }

    /// Backdate the instant this connection became idle.
    pub fn idle_since(mut self, idle_at: Instant) -> Self {
        self.idle_at = idle_at;
        self
    }

    /// Set the probe behavior.
    pub fn with_ping(mut self, ping: Ping) -> Self {
        self.ping = ping;
        self
    }

    /// Start out with the aliveness flag down.
    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }

    /// Raise `flag` when this connection is closed, observable after the
    /// connection itself has been consumed by the pool.
    pub fn notify_close(mut self, flag: Arc<AtomicBool>) -> Self {
        self.close_flag = Some(flag);
        self
    }

    /// Number of probes issued against this connection.
    pub fn pings(&self) -> usize {
        self.pings
    }

    /// Whether this connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drop the aliveness flag, as a broken transport would.
    pub fn kill(&mut self) {
        self.alive = false;
    }
}

impl PoolableConnection for MockConnection {
    fn connect(&mut self, address: &str) -> Result<(), BoxError> {
        self.server = address.to_owned();
        self.alive = true;
        self.closed = false;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn server_name(&self) -> &str {
        &self.server
    }

    fn idle_at(&self) -> Instant {
        self.idle_at
    }

    fn ping(&mut self) {
        self.pings += 1;
        match self.ping {
            Ping::Noop => {}
            Ping::Dies => self.alive = false,
            Ping::Untouchable => panic!("connection must not be probed"),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.alive = false;
            if let Some(flag) = &self.close_flag {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// Error produced by [`failing_connector`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("mock connection refused")]
pub struct MockConnectionError;

/// A connector that always succeeds with a fresh healthy connection.
pub fn connector() -> impl Connect<MockConnection> {
    |server: &str| -> Result<MockConnection, BoxError> { Ok(MockConnection::new(server)) }
}

/// A connector that always fails with [`MockConnectionError`].
pub fn failing_connector() -> impl Connect<MockConnection> {
    |_: &str| -> Result<MockConnection, BoxError> { Err(Box::new(MockConnectionError)) }
}
