//! Shared fixtures for the cross-thread integration tests
//!
//! The tests in this crate run the engine the way a real harness does:
//! one thread plays the remote peer and delivers traffic, the test
//! thread blocks on the engine's wait calls. The helpers here build the
//! peer's messages.

use sipdriver_subscribe_core::prelude::*;

/// Minimal PIDF document with a single tuple
pub fn pidf_single_tuple(tuple_id: &str, basic: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<presence xmlns="urn:ietf:params:xml:ns:pidf" entity="sip:peer@example.com">"#,
            r#"<tuple id="{id}"><status><basic>{basic}</basic></status></tuple>"#,
            r#"</presence>"#
        ),
        id = tuple_id,
        basic = basic,
    )
}

/// A presence NOTIFY as the peer would send it on an established dialog
pub fn peer_notify(dialog_id: &str, state: &str, body: String) -> SipRequest {
    RequestBuilder::new(Method::Notify, "sip:harness@local")
        .dialog_id(dialog_id)
        .event("presence")
        .subscription_state(state)
        .body(body)
        .build()
}

/// The peer's 200 OK to a SUBSCRIBE, granting the given expiry
pub fn peer_subscribe_ok(subscribe: &SipRequest, expires: u32) -> SipResponse {
    SipResponse::for_request(subscribe, StatusCode::Ok).with_expires(expires)
}
