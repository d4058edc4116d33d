//! Subscription lifecycle tests
//!
//! Covers the monotonic state table, SUBSCRIBE transaction settling,
//! expiry bookkeeping, and the one-shot fetch shape.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use sipdriver_subscribe_core::logging;
use sipdriver_subscribe_core::prelude::*;

fn harness() -> (SubscriberManager, Arc<MemoryTransport>) {
    logging::init_for_tests();
    let transport = Arc::new(MemoryTransport::new());
    let manager = SubscriberManager::new(SubscriberConfig::default(), transport.clone());
    (manager, transport)
}

fn notify_for(subscription: &Subscription, state: &str) -> SipRequest {
    RequestBuilder::new(Method::Notify, "sip:harness@local")
        .dialog_id(subscription.dialog_id())
        .event(subscription.event_type().package_name())
        .subscription_state(state)
        .build()
}

#[test]
fn provisional_then_final_settles_the_transaction() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();
    assert_eq!(subscription.status(), SubscriptionStatus::Pending);

    let subscribe = transport.last_request().unwrap();
    manager.dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Trying));
    manager.dispatch_response(
        &SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(1800),
    );

    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));
    assert_eq!(subscription.status(), SubscriptionStatus::Active);
    assert_eq!(subscription.expiry_secs(), 1800);
    assert!(subscription.time_left_secs() <= 1800);
    assert!(subscription.time_left_secs() > 1790);

    // Both responses are on the record, provisional first.
    let responses = subscription.all_responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].status_code(), 100);
    assert_eq!(responses[1].status_code(), 200);
}

#[test]
fn final_without_expires_falls_back_to_the_requested_value() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 1200, None)
        .unwrap();

    let subscribe = transport.last_request().unwrap();
    manager.dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Accepted));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));

    assert_eq!(subscription.status(), SubscriptionStatus::Active);
    assert_eq!(subscription.expiry_secs(), 1200);
}

#[test]
fn timeout_without_final_response_reports_false() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();

    let subscribe = transport.last_request().unwrap();
    manager.dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Trying));

    let started = Instant::now();
    assert!(!subscription.process_subscribe_response(Duration::from_millis(100)));
    assert!(started.elapsed() >= Duration::from_millis(100));
    // Still pending, and the provisional was not lost.
    assert_eq!(subscription.status(), SubscriptionStatus::Pending);
    assert_eq!(subscription.all_responses().len(), 1);
}

#[test]
fn final_failure_terminates_with_the_reason_phrase() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();

    let subscribe = transport.last_request().unwrap();
    manager.dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::BadEvent));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));

    assert!(subscription.is_terminated());
    assert_eq!(
        subscription.termination_reason().as_deref(),
        Some("Bad Event")
    );
}

#[test]
fn terminated_is_sticky_under_later_active_notifies() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();
    let subscribe = transport.last_request().unwrap();
    manager
        .dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(3600));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));

    let terminate = notify_for(&subscription, "terminated;reason=noresource");
    assert_eq!(subscription.process_notify(&terminate).status_code(), 200);
    assert!(subscription.is_terminated());
    assert_eq!(subscription.time_left_secs(), 0);

    // A stale active NOTIFY still gets a 200 but moves nothing.
    let stale = notify_for(&subscription, "active;expires=600");
    assert_eq!(subscription.process_notify(&stale).status_code(), 200);
    assert!(subscription.is_terminated());
    assert_eq!(
        subscription.termination_reason().as_deref(),
        Some("noresource")
    );
}

#[test]
fn pending_notify_never_moves_an_active_subscription_back() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();
    let subscribe = transport.last_request().unwrap();
    manager
        .dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(3600));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));

    let pending = notify_for(&subscription, "pending");
    assert_eq!(subscription.process_notify(&pending).status_code(), 200);
    assert_eq!(subscription.status(), SubscriptionStatus::Active);
}

#[test]
fn fetch_stays_terminated_through_the_whole_exchange() {
    let (manager, transport) = harness();
    let subscription = manager.fetch("sip:alice@example.com").unwrap();

    assert!(subscription.is_fetch());
    assert!(subscription.is_terminated());
    assert_eq!(
        subscription.termination_reason().as_deref(),
        Some(FETCH_TERMINATION_REASON)
    );

    let subscribe = transport.last_request().unwrap();
    assert_eq!(subscribe.expires, Some(0));
    manager
        .dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(0));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));
    // The 200 never reanimates a fetch.
    assert!(subscription.is_terminated());
    assert_eq!(
        subscription.termination_reason().as_deref(),
        Some(FETCH_TERMINATION_REASON)
    );

    // The terminal NOTIFY carries the snapshot and the real reason.
    let notify = RequestBuilder::new(Method::Notify, "sip:harness@local")
        .dialog_id(subscription.dialog_id())
        .event("presence")
        .subscription_state("terminated;reason=timeout")
        .body(r#"<presence><tuple id="1"><status><basic>open</basic></status></tuple></presence>"#)
        .build();
    assert_eq!(subscription.process_notify(&notify).status_code(), 200);
    assert_eq!(subscription.termination_reason().as_deref(), Some("timeout"));
    assert_eq!(
        subscription.presence_devices()["1"].basic_status,
        Some(BasicStatus::Open)
    );
}

#[test]
fn fetch_with_event_id_still_receives_its_snapshot() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 0, Some("shift-a"))
        .unwrap();

    assert!(subscription.is_fetch());
    assert_eq!(subscription.event_id(), Some("shift-a"));
    // The wire request and the registered identity carry the same id.
    let subscribe = transport.last_request().unwrap();
    assert_eq!(subscribe.event.as_deref(), Some("presence;id=shift-a"));

    let notify = RequestBuilder::new(Method::Notify, "sip:harness@local")
        .dialog_id(subscription.dialog_id())
        .event_with_id("presence", "shift-a")
        .subscription_state("terminated;reason=timeout")
        .body(r#"<presence><tuple id="1"><status><basic>open</basic></status></tuple></presence>"#)
        .build();
    assert_eq!(manager.dispatch_request(&notify), DispatchOutcome::Handled);

    let received = subscription.wait_notify(Duration::from_secs(1)).unwrap();
    assert_eq!(subscription.process_notify(&received).status_code(), 200);
    assert_eq!(
        subscription.presence_devices()["1"].basic_status,
        Some(BasicStatus::Open)
    );
    assert_eq!(subscription.termination_reason().as_deref(), Some("timeout"));
    assert!(subscription.event_errors().is_empty());
}

#[test]
fn expiry_timer_restarts_on_each_active_notify() {
    let (manager, transport) = harness();
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .unwrap();
    let subscribe = transport.last_request().unwrap();
    manager
        .dispatch_response(&SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(3600));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));

    let refresh = notify_for(&subscription, "active;expires=1800");
    assert_eq!(subscription.process_notify(&refresh).status_code(), 200);

    let left = subscription.time_left_secs();
    assert!(left <= 1800, "time left {} exceeds declared expiry", left);
    assert!(left >= 1795, "time left {} drifted too far", left);
}
