//! Fluent request builder for the harness and its tests

use bytes::Bytes;
use uuid::Uuid;

use crate::errors::SubscribeResult;
use crate::sip::headers::{split_raw_header, EventHeader};
use crate::sip::message::{Method, SipRequest};

/// Builder for [`SipRequest`] values
///
/// Tests and the manager build requests the same way:
///
/// ```rust
/// use sipdriver_subscribe_core::sip::{Method, RequestBuilder};
///
/// let request = RequestBuilder::new(Method::Notify, "sip:bob@example.com")
///     .dialog_id("dlg-1")
///     .cseq(1)
///     .event("presence")
///     .subscription_state("active;expires=3600")
///     .body("<presence/>")
///     .build();
/// assert_eq!(request.dialog_id, "dlg-1");
/// ```
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    dialog_id: Option<String>,
    cseq: u32,
    event: Option<String>,
    subscription_state: Option<String>,
    expires: Option<u32>,
    extra_headers: Vec<(String, String)>,
    body: Bytes,
}

impl RequestBuilder {
    /// Start building a request for the given method and target URI
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        RequestBuilder {
            method,
            uri: uri.into(),
            dialog_id: None,
            cseq: 1,
            event: None,
            subscription_state: None,
            expires: None,
            extra_headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Set the dialog identifier. Generated if not set.
    pub fn dialog_id(mut self, dialog_id: impl Into<String>) -> Self {
        self.dialog_id = Some(dialog_id.into());
        self
    }

    /// Set the CSeq number
    pub fn cseq(mut self, cseq: u32) -> Self {
        self.cseq = cseq;
        self
    }

    /// Set the Event header from a package name
    pub fn event(mut self, package: &str) -> Self {
        self.event = Some(EventHeader::new(package).to_header_value());
        self
    }

    /// Set the Event header from a package name plus id parameter
    pub fn event_with_id(mut self, package: &str, id: &str) -> Self {
        self.event = Some(EventHeader::with_id(package, id).to_header_value());
        self
    }

    /// Set the raw Subscription-State header value
    pub fn subscription_state(mut self, value: &str) -> Self {
        self.subscription_state = Some(value.to_string());
        self
    }

    /// Set the Expires header
    pub fn expires(mut self, secs: u32) -> Self {
        self.expires = Some(secs);
        self
    }

    /// Add an extra header as a (name, value) pair
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add an extra header from raw caller-supplied text
    ///
    /// Fails if the text has no colon ("no HCOLON"); callers abort the
    /// send on that error rather than retrying.
    pub fn raw_header(mut self, raw: &str) -> SubscribeResult<Self> {
        let (name, value) = split_raw_header(raw)?;
        self.extra_headers.push((name, value));
        Ok(self)
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Finish building
    pub fn build(self) -> SipRequest {
        SipRequest {
            method: self.method,
            uri: self.uri,
            dialog_id: self
                .dialog_id
                .unwrap_or_else(|| format!("dlg-{}", Uuid::new_v4())),
            cseq: self.cseq,
            event: self.event,
            subscription_state: self.subscription_state,
            expires: self.expires,
            extra_headers: self.extra_headers,
            body: self.body,
        }
    }
}
