//! # Corral: a bounded, multi-server connection pool
//!
//! Corral hands out reusable connections to named upstream servers. Each
//! server is capped by a single process-wide limit on simultaneously open
//! connections; idle connections are recycled after a liveness check, and a
//! checkout against a server at capacity suspends until another caller checks
//! a connection back in.
//!
//! ## Architecture Overview
//!
//! The pool is deliberately transport-agnostic. It never opens a socket
//! itself: connections are produced by a caller-supplied [`Connect`] factory
//! and only need to implement the [`PoolableConnection`] capability contract
//! (aliveness, owning server, idle timestamp, liveness probe, close). Wire
//! protocols, authentication, and reconnection strategies all live behind
//! that seam.
//!
//! Internally the pool keeps one registry per server name, created lazily on
//! first contact. A registry tracks its connections in two disjoint sets:
//! *idle* (available for reuse, most-recently-idled first) and *busy*
//! (currently lent out). Admission is checked against the idle + busy total,
//! so a server can never exceed the configured capacity.
//!
//! ## Checkout lifecycle
//!
//! [`Pool::checkout`] resolves in one of three ways:
//!
//! 1. An idle connection passes the health-check policy and is reused.
//!    Connections idle past the caller's threshold are probed first; a probe
//!    that finds the connection dead discards it and frees its slot
//!    immediately.
//! 2. The server is below capacity, so the factory is asked for a fresh
//!    connection. Factory errors surface to exactly this caller and abort
//!    the checkout.
//! 3. The server is at capacity. The caller parks on a wait queue until a
//!    checkin frees capacity, then re-runs admission. Every checkin wakes
//!    every queued waiter, and the woken callers race for the freed slot;
//!    arrival order is FIFO but service order is not.
//!
//! A checked-out connection is wrapped in a [`Pooled`] guard which derefs to
//! the underlying connection and checks it back in when dropped. Dead
//! connections are closed on checkin rather than re-idled.
//!
//! The pool has an explicit lifecycle: [`Pool::close`] closes every idle
//! connection, rejects further checkouts, and wakes all parked waiters with
//! [`Error::Closed`].
//!
//! ## Feature Flags
//!
//! - `mock`: exposes `mock::MockConnection`, a scriptable connection for
//!   exercising pool behavior in downstream test suites.

mod conn;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod pool;
mod queue;
mod registry;

pub use self::conn::{Connect, PoolableConnection};
pub use self::error::Error;
pub use self::pool::{Pool, Pooled};

/// Boxed error type used as the error currency for caller-supplied
/// connectors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Test fixtures
#[cfg(test)]
pub(crate) mod fixtures {

    use std::sync::Once;

    /// Registers a global default tracing subscriber when called for the first time. This is intended
    /// for use in tests.
    pub fn subscribe() {
        static INSTALL_TRACING_SUBSCRIBER: Once = Once::new();
        INSTALL_TRACING_SUBSCRIBER.call_once(|| {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .finish();
            tracing::subscriber::set_global_default(subscriber).unwrap();
        });
    }
}
