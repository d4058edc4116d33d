//! # sipdriver-subscribe-core
//!
//! Event-subscription engine for a SIP test harness. It impersonates a
//! SIP endpoint so automated tests can drive and verify event
//! subscription exchanges against a system under test: presence
//! SUBSCRIBE/NOTIFY per RFC 3265/3856 and call-transfer REFER/NOTIFY per
//! RFC 3515.
//!
//! ## Architecture
//!
//! Inbound requests arrive on a transport delivery thread and flow
//! through the [`routing::StrategyChain`], which picks the strategy
//! matching the Event header and asks the correlator to find the owning
//! [`subscription::Subscription`]. A claimed request is pushed onto that
//! subscription's [`events::WaitQueue`]; test code blocks on
//! [`subscription::Subscription::wait_notify`], then processes the body
//! and obtains a locally built response to send back. The queue is the
//! only synchronization boundary between the delivery side and the test
//! side.
//!
//! Raw SIP parsing, transport, retransmission timers, and dialog state
//! live in the collaborator engine behind [`sip::SipTransport`]; this
//! crate only consumes typed access to the subscription-relevant fields.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sipdriver_subscribe_core::prelude::*;
//!
//! let transport = Arc::new(MemoryTransport::new());
//! let manager = SubscriberManager::new(SubscriberConfig::default(), transport.clone());
//!
//! // Test side: issue a SUBSCRIBE.
//! let subscription = manager.subscribe("sip:alice@example.com", 3600, None).unwrap();
//!
//! // Delivery side: a NOTIFY for that dialog gets claimed and queued.
//! let notify = RequestBuilder::new(Method::Notify, "sip:harness@local")
//!     .dialog_id(subscription.dialog_id())
//!     .event("presence")
//!     .subscription_state("active;expires=3600")
//!     .body(r#"<presence><tuple id="1"><status><basic>open</basic></status></tuple></presence>"#)
//!     .build();
//! assert_eq!(manager.dispatch_request(&notify), DispatchOutcome::Handled);
//!
//! // Test side: blocking, timeout-bounded wait, then process.
//! let received = subscription.wait_notify(Duration::from_secs(1)).unwrap();
//! let reply = subscription.process_notify(&received);
//! assert_eq!(reply.status_code(), 200);
//! assert!(subscription.presence_devices().contains_key("1"));
//! ```

pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod manager;
pub mod presence;
pub mod routing;
pub mod sip;
pub mod subscription;

pub use config::SubscriberConfig;
pub use errors::{SubscribeError, SubscribeResult};
pub use manager::SubscriberManager;
pub use routing::{DispatchOutcome, EventStrategy, StrategyChain};
pub use subscription::{
    EventType, Subscription, SubscriptionKey, SubscriptionStatus, FETCH_TERMINATION_REASON,
};

/// Common imports for harness code and tests
pub mod prelude {
    pub use crate::config::SubscriberConfig;
    pub use crate::errors::{SubscribeError, SubscribeResult};
    pub use crate::manager::SubscriberManager;
    pub use crate::presence::{BasicStatus, PresenceDeviceInfo, PresenceSnapshot};
    pub use crate::routing::{DispatchOutcome, EventStrategy};
    pub use crate::sip::{
        EventHeader, MemoryTransport, Method, RequestBuilder, SipRequest, SipResponse,
        SipTransport, StatusCode, SubscriptionStateHeader,
    };
    pub use crate::subscription::{
        EventType, ReferFragment, Subscription, SubscriptionKey, SubscriptionStatus,
        FETCH_TERMINATION_REASON,
    };
}
