//! Subscriber manager
//!
//! Phone-level facade over the engine: creates subscriptions, holds the
//! authoritative owning references to them, and feeds inbound traffic
//! from the delivery thread into the strategy chain. Subscriptions are
//! never destroyed; retirement moves them to a retired bucket where the
//! correlator no longer sees them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::SubscriberConfig;
use crate::errors::{SubscribeError, SubscribeResult};
use crate::routing::{DispatchOutcome, StrategyChain};
use crate::sip::message::{Method, SipRequest, SipResponse, StatusCode};
use crate::sip::transport::SipTransport;
use crate::sip::RequestBuilder;
use crate::subscription::{Subscription, SubscriptionKey};

struct ManagerInner {
    config: SubscriberConfig,
    transport: Arc<dyn SipTransport>,
    chain: StrategyChain,
    by_key: DashMap<SubscriptionKey, Arc<Subscription>>,
    /// Live subscriptions in creation order; the refer correlator
    /// depends on this ordering.
    live: Mutex<Vec<Arc<Subscription>>>,
    retired: Mutex<Vec<Arc<Subscription>>>,
    next_cseq: AtomicU32,
}

/// Clone-able handle to the subscription engine
#[derive(Clone)]
pub struct SubscriberManager {
    inner: Arc<ManagerInner>,
}

impl SubscriberManager {
    pub fn new(config: SubscriberConfig, transport: Arc<dyn SipTransport>) -> Self {
        let chain = StrategyChain::new(config.strategy_order.clone());
        SubscriberManager {
            inner: Arc::new(ManagerInner {
                config,
                transport,
                chain,
                by_key: DashMap::new(),
                live: Mutex::new(Vec::new()),
                retired: Mutex::new(Vec::new()),
                next_cseq: AtomicU32::new(1),
            }),
        }
    }

    // --- creation surface ---

    /// Issue a SUBSCRIBE with the configured default expiry
    pub fn subscribe_default(&self, target: &str) -> SubscribeResult<Arc<Subscription>> {
        self.subscribe(target, self.inner.config.default_expires_secs, None)
    }

    /// Issue a SUBSCRIBE and create the subscription tracking it
    pub fn subscribe(
        &self,
        target: &str,
        expires: u32,
        event_id: Option<&str>,
    ) -> SubscribeResult<Arc<Subscription>> {
        self.subscribe_with_headers(target, expires, event_id, &[])
    }

    /// Like [`Self::subscribe`], with caller-supplied extra header text
    ///
    /// Each raw header is validated before anything is sent; a header
    /// without a colon aborts the whole operation with a "no HCOLON"
    /// error and no subscription is created.
    pub fn subscribe_with_headers(
        &self,
        target: &str,
        expires: u32,
        event_id: Option<&str>,
        raw_headers: &[&str],
    ) -> SubscribeResult<Arc<Subscription>> {
        if expires > self.inner.config.max_expires_secs {
            return Err(SubscribeError::ExpiryOutOfRange {
                requested: expires,
                max: self.inner.config.max_expires_secs,
            });
        }

        let dialog_id = fresh_dialog_id();
        let cseq = self.inner.next_cseq.fetch_add(1, Ordering::Relaxed);

        let mut builder = RequestBuilder::new(Method::Subscribe, target)
            .dialog_id(dialog_id.clone())
            .cseq(cseq)
            .expires(expires);
        builder = match event_id {
            Some(id) => builder.event_with_id(&self.inner.config.presence_package, id),
            None => builder.event(&self.inner.config.presence_package),
        };
        for raw in raw_headers {
            builder = builder.raw_header(raw)?;
        }
        let request = builder.build();
        self.inner.transport.send_request(&request)?;

        let subscription = Arc::new(if expires == 0 {
            Subscription::fetch(
                target,
                dialog_id,
                event_id.map(str::to_string),
                cseq,
                Arc::clone(&self.inner.transport),
            )
        } else {
            Subscription::presence(
                target,
                dialog_id,
                event_id.map(str::to_string),
                expires,
                cseq,
                Arc::clone(&self.inner.transport),
            )
        });
        self.register(subscription)
    }

    /// One-shot presence fetch: expiry forced to 0, pre-terminated
    pub fn fetch(&self, target: &str) -> SubscribeResult<Arc<Subscription>> {
        self.subscribe(target, 0, None)
    }

    /// Issue a REFER on an existing dialog and track its implicit
    /// subscription
    ///
    /// A dialog may carry several outstanding REFER subscriptions, but
    /// never two with the same event id; duplicates are refused here, at
    /// creation time.
    pub fn refer(
        &self,
        dialog_id: &str,
        refer_to: &str,
        event_id: Option<&str>,
    ) -> SubscribeResult<Arc<Subscription>> {
        let key = SubscriptionKey {
            dialog_id: dialog_id.to_string(),
            event_type: crate::subscription::EventType::Refer,
            event_id: event_id.map(str::to_string),
        };
        if self.inner.by_key.contains_key(&key) {
            return Err(SubscribeError::DuplicateRefer {
                dialog_id: dialog_id.to_string(),
                event_id: event_id.map(str::to_string),
            });
        }

        let cseq = self.inner.next_cseq.fetch_add(1, Ordering::Relaxed);
        let mut builder = RequestBuilder::new(Method::Refer, refer_to)
            .dialog_id(dialog_id)
            .cseq(cseq)
            .header("Refer-To", refer_to);
        if let Some(id) = event_id {
            builder = builder.event_with_id("refer", id);
        }
        let request = builder.build();
        self.inner.transport.send_request(&request)?;

        let subscription = Arc::new(Subscription::refer(
            refer_to,
            dialog_id,
            event_id.map(str::to_string),
            cseq,
            Arc::clone(&self.inner.transport),
        ));
        self.register(subscription)
    }

    fn register(&self, subscription: Arc<Subscription>) -> SubscribeResult<Arc<Subscription>> {
        let key = subscription.key().clone();
        debug!(subscription = %key, "registering subscription");
        self.inner.by_key.insert(key, Arc::clone(&subscription));
        self.inner.live.lock().push(Arc::clone(&subscription));
        Ok(subscription)
    }

    // --- delivery-thread entry points ---

    /// Route an inbound request through the strategy chain
    ///
    /// Non-blocking; runs on the delivery thread. On
    /// [`DispatchOutcome::Rejected`] the caller should transmit
    /// [`Self::orphan_response`].
    pub fn dispatch_request(&self, request: &SipRequest) -> DispatchOutcome {
        let candidates = self.inner.live.lock().clone();
        self.inner.chain.dispatch(&candidates, request)
    }

    /// Route a SUBSCRIBE/REFER response to the subscription that issued
    /// the request
    ///
    /// Correlates by dialog id plus the CSeq of the creating request.
    /// Returns false for responses belonging to no live subscription.
    pub fn dispatch_response(&self, response: &SipResponse) -> bool {
        let live = self.inner.live.lock();
        for subscription in live.iter() {
            if subscription.dialog_id() == response.dialog_id
                && subscription.initial_cseq() == response.cseq
            {
                subscription.offer_response(response.clone());
                return true;
            }
        }
        drop(live);
        warn!(
            dialog_id = %response.dialog_id,
            cseq = response.cseq,
            "response matches no live subscription"
        );
        false
    }

    /// The 481-class reply for a rejected (stray) request
    pub fn orphan_response(&self, request: &SipRequest) -> SipResponse {
        SipResponse::for_request(request, StatusCode::CallOrTransactionDoesNotExist)
    }

    // --- registry access ---

    /// Look up a live subscription by its key
    pub fn subscription(&self, key: &SubscriptionKey) -> Option<Arc<Subscription>> {
        self.inner.by_key.get(key).map(|entry| Arc::clone(&entry))
    }

    /// Live subscriptions in creation order (copy-on-read)
    pub fn live_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.inner.live.lock().clone()
    }

    /// Retired subscriptions in retirement order (copy-on-read)
    pub fn retired_subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.inner.retired.lock().clone()
    }

    /// Move a subscription out of the correlator's sight
    ///
    /// The object itself lives on; history and state stay inspectable.
    pub fn retire(&self, key: &SubscriptionKey) -> bool {
        let Some((_, subscription)) = self.inner.by_key.remove(key) else {
            return false;
        };
        let mut live = self.inner.live.lock();
        live.retain(|s| s.key() != key);
        drop(live);
        self.inner.retired.lock().push(subscription);
        true
    }

    /// The engine configuration, read-only
    pub fn config(&self) -> &SubscriberConfig {
        &self.inner.config
    }
}

fn fresh_dialog_id() -> String {
    format!("dlg-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sip::transport::MemoryTransport;
    use crate::subscription::{EventType, SubscriptionStatus, FETCH_TERMINATION_REASON};

    fn manager() -> (SubscriberManager, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let manager = SubscriberManager::new(SubscriberConfig::default(), transport.clone());
        (manager, transport)
    }

    #[test]
    fn subscribe_transmits_and_registers() {
        let (manager, transport) = manager();
        let subscription = manager
            .subscribe("sip:alice@example.com", 3600, None)
            .unwrap();

        assert_eq!(subscription.status(), SubscriptionStatus::Pending);
        assert_eq!(subscription.event_type(), EventType::Presence);
        assert_eq!(manager.live_subscriptions().len(), 1);

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.method, Method::Subscribe);
        assert_eq!(sent.expires, Some(3600));
        assert_eq!(sent.dialog_id, subscription.dialog_id());
    }

    #[test]
    fn fetch_is_terminated_before_any_response() {
        let (manager, transport) = manager();
        let subscription = manager.fetch("sip:alice@example.com").unwrap();

        assert!(subscription.is_terminated());
        assert_eq!(
            subscription.termination_reason().as_deref(),
            Some(FETCH_TERMINATION_REASON)
        );
        assert_eq!(transport.last_request().unwrap().expires, Some(0));
    }

    #[test]
    fn subscribe_default_uses_configured_expiry() {
        let transport = Arc::new(MemoryTransport::new());
        let config = SubscriberConfig::new().with_default_expires(600);
        let manager = SubscriberManager::new(config, transport.clone());

        let subscription = manager.subscribe_default("sip:alice@example.com").unwrap();
        assert_eq!(transport.last_request().unwrap().expires, Some(600));
        assert_eq!(subscription.expiry_secs(), 600);
    }

    #[test]
    fn bad_raw_header_aborts_before_sending() {
        let (manager, transport) = manager();
        let result = manager.subscribe_with_headers(
            "sip:alice@example.com",
            3600,
            None,
            &["Garbage header without separator"],
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("no HCOLON"));
        assert!(transport.sent_requests().is_empty());
        assert!(manager.live_subscriptions().is_empty());
    }

    #[test]
    fn expiry_beyond_policy_is_refused() {
        let (manager, _) = manager();
        let err = manager
            .subscribe("sip:alice@example.com", 100_000, None)
            .unwrap_err();
        assert!(matches!(err, SubscribeError::ExpiryOutOfRange { .. }));
    }

    #[test]
    fn duplicate_refer_on_same_dialog_and_id_is_refused() {
        let (manager, _) = manager();
        manager
            .refer("dlg-call", "sip:carol@example.com", Some("t1"))
            .unwrap();
        // A second transfer on the same dialog is fine with another id.
        manager
            .refer("dlg-call", "sip:dave@example.com", Some("t2"))
            .unwrap();

        let err = manager
            .refer("dlg-call", "sip:erin@example.com", Some("t1"))
            .unwrap_err();
        assert!(matches!(err, SubscribeError::DuplicateRefer { .. }));
    }

    #[test]
    fn responses_route_by_dialog_and_creating_cseq() {
        let (manager, transport) = manager();
        let subscription = manager
            .subscribe("sip:alice@example.com", 3600, None)
            .unwrap();
        let request = transport.last_request().unwrap();

        let response = SipResponse::for_request(&request, StatusCode::Ok).with_expires(3600);
        assert!(manager.dispatch_response(&response));
        assert!(subscription.process_subscribe_response(std::time::Duration::from_millis(50)));
        assert_eq!(subscription.status(), SubscriptionStatus::Active);

        let unrelated = SipResponse {
            dialog_id: "dlg-unknown".to_string(),
            ..SipResponse::for_request(&request, StatusCode::Ok)
        };
        assert!(!manager.dispatch_response(&unrelated));
    }

    #[test]
    fn retire_hides_subscription_from_dispatch() {
        let (manager, _) = manager();
        let subscription = manager
            .subscribe("sip:alice@example.com", 3600, None)
            .unwrap();
        let key = subscription.key().clone();

        assert!(manager.retire(&key));
        assert!(manager.live_subscriptions().is_empty());
        assert_eq!(manager.retired_subscriptions().len(), 1);
        assert!(manager.subscription(&key).is_none());
        // Retiring twice is a no-op.
        assert!(!manager.retire(&key));
    }
}
