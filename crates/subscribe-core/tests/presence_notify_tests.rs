//! Tests for presence NOTIFY processing
//!
//! Verifies the snapshot model semantics:
//! - each successful NOTIFY replaces the snapshot wholesale
//! - parse failures leave state and snapshot untouched
//! - terminal states always overwrite the previous reason

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use sipdriver_subscribe_core::logging;
use sipdriver_subscribe_core::prelude::*;

/// Helper to create a manager with an active presence subscription
fn active_subscription() -> (SubscriberManager, Arc<Subscription>, Arc<MemoryTransport>) {
    logging::init_for_tests();
    let transport = Arc::new(MemoryTransport::new());
    let manager = SubscriberManager::new(SubscriberConfig::default(), transport.clone());
    let subscription = manager
        .subscribe("sip:alice@example.com", 3600, None)
        .expect("Failed to subscribe");

    let subscribe = transport.last_request().expect("SUBSCRIBE not sent");
    let ok = SipResponse::for_request(&subscribe, StatusCode::Ok).with_expires(3600);
    assert!(manager.dispatch_response(&ok));
    assert!(subscription.process_subscribe_response(Duration::from_millis(200)));
    assert_eq!(subscription.status(), SubscriptionStatus::Active);

    (manager, subscription, transport)
}

/// Helper to create a presence NOTIFY on the subscription's dialog
fn presence_notify(subscription: &Subscription, state: &str, body: &str) -> SipRequest {
    RequestBuilder::new(Method::Notify, "sip:harness@local")
        .dialog_id(subscription.dialog_id())
        .cseq(1)
        .event("presence")
        .subscription_state(state)
        .body(body.to_string())
        .build()
}

#[test]
fn notify_replaces_snapshot_instead_of_merging() {
    let (manager, subscription, _) = active_subscription();

    let first = presence_notify(
        &subscription,
        "active;expires=2400",
        r#"<presence><tuple id="1"><status><basic>closed</basic></status></tuple></presence>"#,
    );
    assert_eq!(manager.dispatch_request(&first), DispatchOutcome::Handled);
    let received = subscription.wait_notify(Duration::from_secs(1)).unwrap();
    assert_eq!(subscription.process_notify(&received).status_code(), 200);

    let devices = subscription.presence_devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices["1"].basic_status, Some(BasicStatus::Closed));

    let second = presence_notify(
        &subscription,
        "active;expires=1800",
        r#"<presence><tuple id="2"><status><basic>open</basic></status></tuple></presence>"#,
    );
    assert_eq!(manager.dispatch_request(&second), DispatchOutcome::Handled);
    let received = subscription.wait_notify(Duration::from_secs(1)).unwrap();
    assert_eq!(subscription.process_notify(&received).status_code(), 200);

    // Tuple "1" is gone: the second snapshot replaced the first.
    let devices = subscription.presence_devices();
    assert_eq!(devices.len(), 1);
    assert!(!devices.contains_key("1"));
    assert_eq!(devices["2"].basic_status, Some(BasicStatus::Open));
}

#[test]
fn tuples_within_one_notify_coexist() {
    let (_, subscription, _) = active_subscription();

    let notify = presence_notify(
        &subscription,
        "active",
        r#"<presence>
            <tuple id="desk"><status><basic>open</basic></status></tuple>
            <tuple id="mobile"><status><basic>closed</basic></status></tuple>
        </presence>"#,
    );
    assert_eq!(subscription.process_notify(&notify).status_code(), 200);

    let devices = subscription.presence_devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices["desk"].basic_status, Some(BasicStatus::Open));
    assert_eq!(devices["mobile"].basic_status, Some(BasicStatus::Closed));
}

#[test]
fn parse_failure_mutates_nothing_and_reports_400() {
    let (_, subscription, _) = active_subscription();

    let good = presence_notify(
        &subscription,
        "active;expires=2400",
        r#"<presence>
            <tuple id="1"><status><basic>closed</basic></status></tuple>
            <note>In the lab</note>
        </presence>"#,
    );
    assert_eq!(subscription.process_notify(&good).status_code(), 200);

    let devices_before = subscription.presence_devices();
    let notes_before = subscription.presence_notes();
    let extensions_before = subscription.presence_extensions();
    let status_before = subscription.status();

    let malformed = presence_notify(
        &subscription,
        "active;expires=2400",
        r#"<presence><tuple id="2"><status><basic>open</basic></status></presence>"#,
    );
    let response = subscription.process_notify(&malformed);
    assert_eq!(response.status_code(), 400);

    let errors = subscription.event_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("parsing error"));

    // Snapshot, notes, extensions, and state are exactly as before.
    assert_eq!(subscription.presence_devices(), devices_before);
    assert_eq!(subscription.presence_notes(), notes_before);
    assert_eq!(subscription.presence_extensions(), extensions_before);
    assert_eq!(subscription.status(), status_before);

    subscription.clear_event_errors();
    assert!(subscription.event_errors().is_empty());
}

#[test]
fn declared_expiry_beyond_granted_is_rejected_without_mutation() {
    let (_, subscription, _) = active_subscription();

    let overreaching = presence_notify(
        &subscription,
        "active;expires=7200",
        r#"<presence><tuple id="1"><status><basic>open</basic></status></tuple></presence>"#,
    );
    let response = subscription.process_notify(&overreaching);
    assert_eq!(response.status_code(), 400);
    assert!(subscription.presence_devices().is_empty());
    assert_eq!(subscription.event_errors().len(), 1);
}

#[test]
fn terminal_reason_always_overwrites_the_previous_one() {
    let (_, subscription, _) = active_subscription();

    let first = presence_notify(&subscription, "terminated;reason=timeout", "");
    assert_eq!(subscription.process_notify(&first).status_code(), 200);
    assert!(subscription.is_terminated());
    assert_eq!(subscription.termination_reason().as_deref(), Some("timeout"));

    let second = presence_notify(&subscription, "terminated;reason=deactivated", "");
    assert_eq!(subscription.process_notify(&second).status_code(), 200);
    assert_eq!(
        subscription.termination_reason().as_deref(),
        Some("deactivated")
    );
}

#[test]
fn top_level_notes_and_extensions_are_exposed() {
    let (_, subscription, _) = active_subscription();

    let notify = presence_notify(
        &subscription,
        "active",
        r#"<presence>
            <tuple id="1"><status><basic>open</basic></status></tuple>
            <note xml:lang="en">Gone fishing</note>
            <ex:mood xmlns:ex="urn:example">grumpy</ex:mood>
        </presence>"#,
    );
    assert_eq!(subscription.process_notify(&notify).status_code(), 200);

    let notes = subscription.presence_notes();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].value, "Gone fishing");
    assert_eq!(notes[0].lang.as_deref(), Some("en"));

    let extensions = subscription.presence_extensions();
    assert_eq!(extensions.len(), 1);
    assert_eq!(extensions[0].element, "ex:mood");
    assert_eq!(extensions[0].content, "grumpy");
}

#[test]
fn reply_to_notify_transmits_through_the_collaborator() {
    let (manager, subscription, transport) = active_subscription();

    let notify = presence_notify(&subscription, "active", "");
    assert_eq!(manager.dispatch_request(&notify), DispatchOutcome::Handled);
    let received = subscription.wait_notify(Duration::from_secs(1)).unwrap();
    let response = subscription.process_notify(&received);

    assert!(subscription.reply_to_notify(&received, &response));
    let sent = transport.last_response().expect("reply not sent");
    assert_eq!(sent.status_code(), 200);
    assert_eq!(sent.dialog_id, subscription.dialog_id());
}
