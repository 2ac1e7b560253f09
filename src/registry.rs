//! Per-server idle/busy bookkeeping.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use tracing::trace;

use crate::conn::PoolableConnection;

/// Identity token for a connection tracked by a registry.
///
/// Tokens are minted by the pool when a connection is first registered and
/// follow the connection through its busy/idle transitions, so membership
/// checks compare identity rather than connection state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnId(u64);

impl ConnId {
    pub(crate) fn new(value: u64) -> Self {
        ConnId(value)
    }
}

impl fmt::Debug for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnId({})", self.0)
    }
}

/// Bookkeeping for a single server's connections.
///
/// Every tracked connection is in exactly one of the two sets: `idle` holds
/// the connections available for reuse (most-recently-idled last, so reuse
/// is LIFO and favors recently-warm connections), `busy` holds the identity
/// tokens of connections currently lent out. The pool checks admission
/// against `size()`, the combined total.
pub(crate) struct Registry<C> {
    idle: Vec<(ConnId, C)>,
    busy: HashSet<ConnId>,
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("idle", &self.idle.len())
            .field("busy", &self.busy.len())
            .finish()
    }
}

impl<C> Registry<C> {
    pub(crate) fn new() -> Self {
        Self {
            idle: Vec::new(),
            busy: HashSet::new(),
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.idle.len() + self.busy.len()
    }

    pub(crate) fn num_idle(&self) -> usize {
        self.idle.len()
    }

    pub(crate) fn num_busy(&self) -> usize {
        self.busy.len()
    }

    /// Record a freshly created connection as lent out.
    pub(crate) fn register_busy(&mut self, id: ConnId) {
        self.busy.insert(id);
    }
}

impl<C> Registry<C>
where
    C: PoolableConnection,
{
    /// Remove and return the most-recently-idled connection, moving it to
    /// the busy set. The caller either lends it out or discards it via
    /// [`close_connection`](Registry::close_connection).
    pub(crate) fn get_idle(&mut self) -> Option<(ConnId, C)> {
        let (id, conn) = self.idle.pop()?;
        self.busy.insert(id);
        Some((id, conn))
    }

    /// Move a lent connection back to the idle set. Absence from the busy
    /// set is tolerated.
    pub(crate) fn return_busy(&mut self, id: ConnId, conn: C) {
        self.busy.remove(&id);
        self.idle.push((id, conn));
    }

    /// Health-check policy for a connection taken from the idle set.
    ///
    /// A liveness probe is only paid for connections idle past `threshold`;
    /// freshly reused connections skip it. A connection found dead is closed
    /// and removed immediately, so its slot is visible to the next admission
    /// check in the same checkout.
    pub(crate) fn health_check(&mut self, id: ConnId, conn: &mut C, threshold: Duration) -> bool {
        if conn.idle_at().elapsed() > threshold {
            trace!(?id, "probing connection idle past threshold");
            conn.ping();
        }

        if !conn.is_alive() {
            self.close_connection(id, conn);
            return false;
        }

        true
    }

    /// Close a connection and remove it from the busy set.
    pub(crate) fn close_connection(&mut self, id: ConnId, conn: &mut C) {
        trace!(?id, "closing connection");
        conn.close();
        self.busy.remove(&id);
    }

    /// Close and drop every idle connection, returning how many were closed.
    pub(crate) fn close_idle(&mut self) -> usize {
        let drained = self.idle.len();
        for (id, mut conn) in self.idle.drain(..) {
            trace!(?id, "closing idle connection");
            conn.close();
        }
        drained
    }
}
