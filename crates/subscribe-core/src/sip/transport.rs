//! Transport seam toward the collaborator engine
//!
//! The subscription engine never transmits on its own; every outbound
//! message goes through this trait. Tests plug in [`MemoryTransport`] to
//! capture traffic in process.

use parking_lot::Mutex;

use crate::errors::SubscribeResult;
use crate::sip::message::{SipRequest, SipResponse};

/// Outbound side of the SIP collaborator
pub trait SipTransport: Send + Sync {
    /// Transmit a request
    fn send_request(&self, request: &SipRequest) -> SubscribeResult<()>;

    /// Transmit a response answering `request`
    fn send_response(&self, request: &SipRequest, response: &SipResponse) -> SubscribeResult<()>;
}

/// In-process transport that records everything it is asked to send
#[derive(Default)]
pub struct MemoryTransport {
    sent_requests: Mutex<Vec<SipRequest>>,
    sent_responses: Mutex<Vec<(SipRequest, SipResponse)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests sent so far, in order
    pub fn sent_requests(&self) -> Vec<SipRequest> {
        self.sent_requests.lock().clone()
    }

    /// All (request, response) pairs sent so far, in order
    pub fn sent_responses(&self) -> Vec<(SipRequest, SipResponse)> {
        self.sent_responses.lock().clone()
    }

    /// The most recently sent request
    pub fn last_request(&self) -> Option<SipRequest> {
        self.sent_requests.lock().last().cloned()
    }

    /// The most recently sent response
    pub fn last_response(&self) -> Option<SipResponse> {
        self.sent_responses.lock().last().map(|(_, r)| r.clone())
    }
}

impl SipTransport for MemoryTransport {
    fn send_request(&self, request: &SipRequest) -> SubscribeResult<()> {
        self.sent_requests.lock().push(request.clone());
        Ok(())
    }

    fn send_response(&self, request: &SipRequest, response: &SipResponse) -> SubscribeResult<()> {
        self.sent_responses
            .lock()
            .push((request.clone(), response.clone()));
        Ok(())
    }
}
