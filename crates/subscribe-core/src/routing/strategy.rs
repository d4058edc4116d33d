//! Event strategy chain
//!
//! A closed set of claim strategies, one per event type, tried in a
//! fixed order decided at construction and never re-ordered mid-run.
//! Each strategy inspects the Event header cheaply, uses the correlator
//! to find the owning subscription, and either forwards the request to
//! that subscription's queue or reports back. Strategies classify and
//! forward only; no reply is ever sent from here.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::routing::correlator::{correlate_presence, correlate_refer};
use crate::sip::headers::EventHeader;
use crate::sip::message::SipRequest;
use crate::subscription::Subscription;

/// What the chain decided about an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A strategy found the owning subscription and queued the request
    Handled,
    /// A strategy claimed the request but found no owner; the caller
    /// should reject it (481-class, stray)
    Rejected,
    /// No strategy claimed the request; the caller continues its own
    /// handling
    NotClaimed,
}

/// One claim strategy in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStrategy {
    Presence,
    Refer,
    Conference,
}

impl EventStrategy {
    /// Event package this strategy answers for
    pub fn package_name(&self) -> &'static str {
        match self {
            EventStrategy::Presence => "presence",
            EventStrategy::Refer => "refer",
            EventStrategy::Conference => "conference",
        }
    }

    /// Cheap Event-header gate, safe to run on the delivery thread
    pub fn accepts(&self, event: &EventHeader) -> bool {
        event.is_package(self.package_name())
    }

    fn dispatch(
        &self,
        candidates: &[Arc<Subscription>],
        request: &SipRequest,
        event: &EventHeader,
    ) -> DispatchOutcome {
        if !self.accepts(event) {
            return DispatchOutcome::NotClaimed;
        }

        match self {
            EventStrategy::Presence => {
                match correlate_presence(candidates, &request.dialog_id, event) {
                    Some(subscription) => {
                        debug!(subscription = %subscription.key(), "queueing presence NOTIFY");
                        subscription.enqueue_notify(request.clone());
                        DispatchOutcome::Handled
                    }
                    None => {
                        warn!(
                            dialog_id = %request.dialog_id,
                            "stray presence NOTIFY, rejecting"
                        );
                        DispatchOutcome::Rejected
                    }
                }
            }
            EventStrategy::Refer => {
                match correlate_refer(candidates, &request.dialog_id, event) {
                    Some(subscription) => {
                        debug!(subscription = %subscription.key(), "queueing refer NOTIFY");
                        subscription.enqueue_notify(request.clone());
                        DispatchOutcome::Handled
                    }
                    None => DispatchOutcome::NotClaimed,
                }
            }
            EventStrategy::Conference => {
                // Pure event-type gate: no routing, the caller keeps the
                // request either way.
                debug!(dialog_id = %request.dialog_id, "conference event passed through");
                DispatchOutcome::NotClaimed
            }
        }
    }
}

/// Ordered chain of claim strategies
pub struct StrategyChain {
    strategies: Vec<EventStrategy>,
}

impl StrategyChain {
    /// Build a chain with the given fixed order
    pub fn new(strategies: Vec<EventStrategy>) -> Self {
        StrategyChain { strategies }
    }

    /// The configured order
    pub fn order(&self) -> &[EventStrategy] {
        &self.strategies
    }

    /// Classify and forward an inbound request
    ///
    /// Runs on the delivery thread; the only side effect is the queue
    /// push performed by a claiming strategy.
    pub fn dispatch(
        &self,
        candidates: &[Arc<Subscription>],
        request: &SipRequest,
    ) -> DispatchOutcome {
        let Some(raw) = request.event.as_deref() else {
            debug!("request without Event header, not claimed");
            return DispatchOutcome::NotClaimed;
        };
        let Ok(event) = EventHeader::from_header_value(raw) else {
            debug!(event = raw, "unreadable Event header, not claimed");
            return DispatchOutcome::NotClaimed;
        };

        for strategy in &self.strategies {
            match strategy.dispatch(candidates, request, &event) {
                DispatchOutcome::NotClaimed => continue,
                outcome => return outcome,
            }
        }
        DispatchOutcome::NotClaimed
    }
}
