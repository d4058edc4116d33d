//! Typed surface toward the SIP protocol collaborator
//!
//! Raw message parsing, transport, retransmission, and transaction state
//! all live in the underlying SIP engine. The harness only needs typed
//! access to the data it correlates and mutates on: method, status, dialog
//! id, CSeq, Event, Subscription-State, Expires, and the body.

pub mod builder;
pub mod headers;
pub mod message;
pub mod transport;

pub use builder::RequestBuilder;
pub use headers::{parse_sipfrag_cseq, split_raw_header, EventHeader, SubscriptionStateHeader};
pub use message::{Method, SipRequest, SipResponse, StatusCode};
pub use transport::{MemoryTransport, SipTransport};
