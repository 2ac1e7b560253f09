//! The pool orchestrator: admission control, checkout/checkin, lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::conn::{Connect, PoolableConnection};
use crate::error::Error;
use crate::queue::WaitQueue;
use crate::registry::{ConnId, Registry};

/// A bounded pool of connections to named servers.
///
/// The pool owns one registry per server name, created lazily on
/// first contact, and a wait queue shared by every server. `Pool` is a
/// cheaply cloneable handle; all clones share the same state.
///
/// Connections are produced by the [`Connect`] factory supplied to
/// [`Pool::new`] and lent out wrapped in a [`Pooled`] guard, which checks
/// the connection back in when dropped.
pub struct Pool<C>
where
    C: PoolableConnection,
{
    shared: Arc<Shared<C>>,
}

impl<C> Clone for Pool<C>
where
    C: PoolableConnection,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C> fmt::Debug for Pool<C>
where
    C: PoolableConnection,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("max_pool_size", &self.shared.max_pool_size)
            .finish_non_exhaustive()
    }
}

struct Shared<C>
where
    C: PoolableConnection,
{
    connect: Box<dyn Connect<C>>,
    max_pool_size: usize,

    // Lock discipline: `inner` and `queue` are never held at the same time.
    // Both checkout and checkin release the registry map before touching the
    // wait queue.
    inner: Mutex<PoolInner<C>>,
    queue: Mutex<WaitQueue>,
}

struct PoolInner<C> {
    servers: HashMap<String, Registry<C>>,
    next_id: u64,
    closed: bool,
}

impl<C> PoolInner<C>
where
    C: PoolableConnection,
{
    fn registry_mut(&mut self, server: &str) -> &mut Registry<C> {
        self.servers
            .entry(server.to_owned())
            .or_insert_with(Registry::new)
    }

    fn mint_id(&mut self) -> ConnId {
        self.next_id += 1;
        ConnId::new(self.next_id)
    }
}

impl<C> Pool<C>
where
    C: PoolableConnection,
{
    /// Create a pool that lends at most `max_pool_size` simultaneous
    /// connections per server, creating new ones through `connect`.
    ///
    /// # Panics
    ///
    /// Panics if `max_pool_size` is zero: a pool with no capacity would park
    /// every checkout forever.
    pub fn new<F>(connect: F, max_pool_size: usize) -> Self
    where
        F: Connect<C>,
    {
        assert!(max_pool_size > 0, "pool capacity must be positive");
        Self {
            shared: Arc::new(Shared {
                connect: Box::new(connect),
                max_pool_size,
                inner: Mutex::new(PoolInner {
                    servers: HashMap::new(),
                    next_id: 0,
                    closed: false,
                }),
                queue: Mutex::new(WaitQueue::default()),
            }),
        }
    }

    /// Borrow a connection to `server`, waiting if the server is at
    /// capacity.
    ///
    /// Idle connections are reused most-recently-idled first; one that has
    /// sat idle longer than `idle_threshold` is probed before reuse and
    /// discarded if the probe finds it dead. When no idle connection is
    /// usable and the server is below capacity, the factory is invoked; its
    /// error aborts this checkout immediately.
    ///
    /// The wait has no deadline; see
    /// [`checkout_timeout`](Pool::checkout_timeout). Dropping the returned
    /// future while it is parked is safe: its waiter is skipped on the next
    /// wake.
    pub async fn checkout(&self, server: &str, idle_threshold: Duration) -> Result<Pooled<C>, Error> {
        loop {
            if let Some(conn) = self.try_checkout(server, idle_threshold)? {
                return Ok(conn);
            }

            // Park before re-checking so a checkin that lands between the
            // capacity check and the wait cannot be missed.
            let waiter = self.shared.queue.lock().waiter();

            if let Some(conn) = self.try_checkout(server, idle_threshold)? {
                return Ok(conn);
            }

            trace!(server, "server at capacity, waiting for a checkin");
            let _ = waiter.await;
        }
    }

    /// [`checkout`](Pool::checkout) with a deadline.
    ///
    /// Fails with [`Error::CheckoutTimeout`] if no connection became
    /// available within `timeout`.
    pub async fn checkout_timeout(
        &self,
        server: &str,
        idle_threshold: Duration,
        timeout: Duration,
    ) -> Result<Pooled<C>, Error> {
        match tokio::time::timeout(timeout, self.checkout(server, idle_threshold)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(server, "checkout deadline elapsed");
                Err(Error::CheckoutTimeout {
                    server: server.to_owned(),
                })
            }
        }
    }

    /// One pass of the admission procedure: reuse a healthy idle
    /// connection, or create below capacity. `Ok(None)` means the server is
    /// at capacity and the caller should wait.
    fn try_checkout(
        &self,
        server: &str,
        idle_threshold: Duration,
    ) -> Result<Option<Pooled<C>>, Error> {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return Err(Error::Closed);
        }

        {
            let registry = inner.registry_mut(server);

            while let Some((id, mut conn)) = registry.get_idle() {
                if registry.health_check(id, &mut conn, idle_threshold) {
                    trace!(server, ?id, "reusing idle connection");
                    return Ok(Some(self.lend(id, conn)));
                }
                debug!(server, ?id, "discarded dead idle connection");
            }

            if registry.size() >= self.shared.max_pool_size {
                return Ok(None);
            }
        }

        // Below capacity: ask the factory for a fresh connection. The
        // registry lock is held across the call, serializing admission
        // decisions for the pool.
        let conn = self
            .shared
            .connect
            .connect(server)
            .map_err(|source| Error::Connect {
                server: server.to_owned(),
                source,
            })?;

        let id = inner.mint_id();
        inner.registry_mut(server).register_busy(id);
        debug!(server, ?id, "registered new connection");
        Ok(Some(self.lend(id, conn)))
    }

    fn lend(&self, id: ConnId, conn: C) -> Pooled<C> {
        Pooled {
            connection: Some(conn),
            id,
            pool: Arc::downgrade(&self.shared),
        }
    }

    /// Close the pool: every idle connection is closed, parked waiters are
    /// woken with [`Error::Closed`], and further checkouts are rejected.
    ///
    /// Connections still lent out are closed when they are checked back in.
    /// Closing an already-closed pool is a no-op.
    pub fn close(&self) {
        {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;

            for (server, registry) in inner.servers.iter_mut() {
                let closed = registry.close_idle();
                if closed > 0 {
                    debug!(server = %server, closed, "closed idle connections");
                }
            }
        }

        self.shared.queue.lock().wake_all();
    }

    /// Whether [`close`](Pool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }

    /// Number of idle connections currently held for `server`.
    pub fn num_idle(&self, server: &str) -> usize {
        self.shared
            .inner
            .lock()
            .servers
            .get(server)
            .map_or(0, Registry::num_idle)
    }

    /// Number of connections currently lent out for `server`.
    pub fn num_busy(&self, server: &str) -> usize {
        self.shared
            .inner
            .lock()
            .servers
            .get(server)
            .map_or(0, Registry::num_busy)
    }
}

impl<C> Shared<C>
where
    C: PoolableConnection,
{
    /// Check a lent connection back in.
    ///
    /// An alive connection moves back to its server's idle set; a dead one
    /// (or any checkin after the pool closed) is closed and its slot
    /// reclaimed. Every checkin then wakes all queued waiters, which
    /// re-race for the freed capacity; this broadcast keeps checkin free of
    /// any hand-off decision at the cost of strict FIFO service.
    fn checkin(&self, id: ConnId, mut conn: C) {
        let server = conn.server_name().to_owned();

        {
            let mut inner = self.inner.lock();
            let closed = inner.closed;
            let registry = inner.registry_mut(&server);

            if !closed && conn.is_alive() {
                trace!(server = %server, ?id, "connection checked in");
                registry.return_busy(id, conn);
            } else {
                debug!(server = %server, ?id, "closing connection on checkin");
                registry.close_connection(id, &mut conn);
            }
        }

        self.queue.lock().wake_all();
    }
}

/// A connection lent out by a [`Pool`].
///
/// Derefs to the underlying connection. Dropping the guard checks the
/// connection back in: alive connections return to the idle set, dead ones
/// are closed and their slot freed. If the pool itself is gone, the
/// connection is simply closed.
pub struct Pooled<C>
where
    C: PoolableConnection,
{
    connection: Option<C>,
    id: ConnId,
    pool: Weak<Shared<C>>,
}

impl<C> fmt::Debug for Pooled<C>
where
    C: PoolableConnection + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.connection).finish()
    }
}

impl<C> Deref for Pooled<C>
where
    C: PoolableConnection,
{
    type Target = C;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("connection only taken on Drop")
    }
}

impl<C> DerefMut for Pooled<C>
where
    C: PoolableConnection,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("connection only taken on Drop")
    }
}

impl<C> Drop for Pooled<C>
where
    C: PoolableConnection,
{
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            match self.pool.upgrade() {
                Some(shared) => shared.checkin(self.id, connection),
                None => connection.close(),
            }
        }
    }
}
