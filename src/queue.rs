//! The wait queue for checkouts parked at capacity.

use std::collections::VecDeque;

use tokio::sync::oneshot::{self, Receiver, Sender};
use tracing::trace;

/// FIFO queue of parked checkouts.
///
/// Each waiter is a one-shot wake signal. A waiter exists only between the
/// moment a checkout finds no capacity and the moment a checkin signals it;
/// a checkout that is cancelled while parked simply drops its receiver and
/// is skipped when the queue is drained.
#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    waiters: VecDeque<Sender<()>>,
}

impl WaitQueue {
    /// Park a new waiter at the tail of the queue, returning its wake
    /// signal.
    pub(crate) fn waiter(&mut self) -> Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        rx
    }

    /// Remove and signal every currently queued waiter, in arrival order.
    ///
    /// This is a broadcast: the woken checkouts re-race for whatever
    /// capacity was freed. Either the queue is empty or every present
    /// waiter is signaled; there is no partial wake.
    pub(crate) fn wake_all(&mut self) {
        if self.waiters.is_empty() {
            return;
        }

        trace!(waiters = %self.waiters.len(), "walking waiters");
        for waiter in self.waiters.drain(..) {
            if waiter.send(()).is_err() {
                trace!("skipping closed waiter");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }
}
