//! Ordered tracking of responses to an outstanding request
//!
//! A SUBSCRIBE or REFER transaction may see several responses before it
//! settles: retransmissions and provisional-then-final patterns. The
//! tracker keeps the ordered, append-only record for history queries and
//! feeds arrivals to the waiting test thread through a [`WaitQueue`].

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::events::wait_queue::WaitQueue;
use crate::sip::message::SipResponse;

/// Records and replays the ordered response sequence for one subscription
pub struct ResponseTracker {
    record: Mutex<Vec<SipResponse>>,
    feed: WaitQueue<SipResponse>,
}

impl ResponseTracker {
    pub fn new() -> Self {
        ResponseTracker {
            record: Mutex::new(Vec::new()),
            feed: WaitQueue::new(),
        }
    }

    /// Delivery-thread entry: hand a freshly received response to the
    /// consumer side. Non-blocking.
    pub fn offer(&self, response: SipResponse) {
        self.feed.push(response);
    }

    /// Append a response to the ordered record
    pub fn note(&self, response: SipResponse) {
        self.record.lock().push(response);
    }

    /// Consumer-thread entry: next received response, or `None` on timeout
    pub fn wait_next(&self, timeout: Duration) -> Option<SipResponse> {
        self.feed.wait_next(timeout)
    }

    /// Non-blocking pop of the next received response
    pub fn try_next(&self) -> Option<SipResponse> {
        self.feed.try_next()
    }

    /// Wait for a final (>= 200) response, draining provisionals
    ///
    /// Drained provisionals are noted into the record. Returns `None` if
    /// no final response arrives within the timeout.
    pub fn wait_final(&self, timeout: Duration) -> Option<SipResponse> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let response = self.feed.wait_next(remaining)?;
            self.note(response.clone());
            if response.status.is_final() {
                return Some(response);
            }
        }
    }

    /// Copy-on-read view of the full ordered record
    pub fn all(&self) -> Vec<SipResponse> {
        self.record.lock().clone()
    }

    /// The most recently recorded response
    pub fn last(&self) -> Option<SipResponse> {
        self.record.lock().last().cloned()
    }
}

impl Default for ResponseTracker {
    fn default() -> Self {
        Self::new()
    }
}
