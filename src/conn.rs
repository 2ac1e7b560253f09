//! Capability contract for pooled connections and their factory.

use std::time::Instant;

use crate::BoxError;

/// A connection that can be managed by a [`Pool`](crate::Pool).
///
/// The pool treats connections as opaque capabilities: it never inspects
/// their transport, only their aliveness, owning server, and idle timestamp.
/// Membership in the pool's idle/busy sets is tracked by identity tokens
/// assigned at registration, never by structural equality, so implementations
/// do not need `PartialEq`.
pub trait PoolableConnection: Send + Sized + 'static {
    /// Establish the underlying transport to `address`.
    ///
    /// The pool itself never calls this; it belongs to the contract so that
    /// a driver can re-dial through the same object the pool hands around.
    /// Fails with the driver's connection error if the address is
    /// unreachable.
    fn connect(&mut self, address: &str) -> Result<(), BoxError>;

    /// Whether the connection is currently believed to be usable.
    fn is_alive(&self) -> bool;

    /// The name of the server this connection belongs to.
    fn server_name(&self) -> &str;

    /// The instant this connection last became idle.
    fn idle_at(&self) -> Instant;

    /// Probe liveness.
    ///
    /// This is a side-effecting check: a probe that finds the connection
    /// dead updates the aliveness flag, observable through
    /// [`is_alive`](PoolableConnection::is_alive). The pool only probes
    /// connections that have sat idle past the caller's threshold.
    fn ping(&mut self);

    /// Close the connection.
    ///
    /// Must be idempotent: closing an already-closed connection is a no-op.
    fn close(&mut self);
}

/// Factory for new connections, supplied to [`Pool::new`](crate::Pool::new).
///
/// Implemented for any `Fn(&str) -> Result<C, BoxError>` closure. The pool
/// invokes the factory while holding its registry lock, serializing
/// admission decisions; factories are expected to be fast or to defer slow
/// work until the connection is first used.
pub trait Connect<C>: Send + Sync + 'static
where
    C: PoolableConnection,
{
    /// Establish a new connection to the named server.
    fn connect(&self, server: &str) -> Result<C, BoxError>;
}

impl<F, C> Connect<C> for F
where
    F: Fn(&str) -> Result<C, BoxError> + Send + Sync + 'static,
    C: PoolableConnection,
{
    fn connect(&self, server: &str) -> Result<C, BoxError> {
        (self)(server)
    }
}
