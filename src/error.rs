//! Errors surfaced by pool checkouts.

use crate::BoxError;

/// Error returned by [`Pool::checkout`](crate::Pool::checkout) and
/// [`Pool::checkout_timeout`](crate::Pool::checkout_timeout).
///
/// All failures are scoped to a single checkout: a factory error never
/// affects other waiters or other servers.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The connector failed to establish a new connection. The checkout is
    /// abandoned; there is no implicit retry.
    #[error("failed to connect to {server}")]
    Connect {
        /// The server the connection was meant for.
        server: String,

        /// The connector's underlying error.
        #[source]
        source: BoxError,
    },

    /// The pool has been closed and no longer lends connections.
    #[error("pool is closed")]
    Closed,

    /// No connection became available before the checkout deadline.
    #[error("timed out waiting for a connection to {server}")]
    CheckoutTimeout {
        /// The server the checkout was waiting on.
        server: String,
    },
}
