//! Single-consumer, timeout-bounded handoff queue
//!
//! Bridges the asynchronous, callback-delivered transport side to
//! blocking, straight-line test code. `push` never blocks; `wait_next`
//! blocks the calling thread with a deadline and returns items in FIFO
//! order. A timed-out wait leaves the queue untouched, so a later call
//! still retrieves a late-arriving item.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// FIFO handoff between a producer thread and one logical consumer
///
/// The single-consumer contract is a caller responsibility: concurrent
/// `wait_next` calls from multiple threads on the same queue are not
/// guarded against and have no defined delivery order.
pub struct WaitQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        WaitQueue {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Append an item and wake at most one waiter. Never blocks.
    ///
    /// With no waiter blocked, the item stays buffered; pushing onto a
    /// non-empty backlog appends rather than overwrites.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Block until an item is available or the timeout elapses
    ///
    /// Backlogged items are returned first, in arrival order.
    pub fn wait_next(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                // One last look: the producer may have slipped in between
                // the timeout and reacquiring the lock.
                return items.pop_front();
            }
        }
    }

    /// Non-blocking pop
    pub fn try_next(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for WaitQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
