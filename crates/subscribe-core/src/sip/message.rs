//! SIP request and response messages as the harness sees them
//!
//! These are structured views, not wire parsers: the collaborator engine
//! hands over messages with the subscription-relevant fields already
//! accessible. Responses are built from the request they answer so the
//! dialog and CSeq correlation data survives into the history records.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// SIP methods the subscription engine deals with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// SUBSCRIBE: requests notification of an event
    Subscribe,
    /// NOTIFY: provides information about an event
    Notify,
    /// REFER: asks the recipient to issue a request
    Refer,
    /// MESSAGE: pager-mode instant message (pass-through only)
    Message,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
        };
        write!(f, "{}", s)
    }
}

/// SIP status codes the engine emits or inspects
///
/// Classes follow RFC 3261 Section 21: `1xx` provisional, `2xx` success,
/// `4xx` client error, `5xx` server error. Only the codes the harness
/// actually produces or branches on are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum StatusCode {
    /// 100 Trying
    Trying = 100,
    /// 200 OK
    Ok = 200,
    /// 202 Accepted
    Accepted = 202,
    /// 400 Bad Request
    BadRequest = 400,
    /// 481 Call/Transaction Does Not Exist
    CallOrTransactionDoesNotExist = 481,
    /// 489 Bad Event
    BadEvent = 489,
    /// 500 Server Internal Error
    ServerInternalError = 500,
}

impl StatusCode {
    /// Numeric status code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Standard reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Trying => "Trying",
            StatusCode::Ok => "OK",
            StatusCode::Accepted => "Accepted",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::CallOrTransactionDoesNotExist => "Call/Transaction Does Not Exist",
            StatusCode::BadEvent => "Bad Event",
            StatusCode::ServerInternalError => "Server Internal Error",
        }
    }

    /// True for 1xx responses
    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }

    /// True for 2xx responses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// True for 4xx responses
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// True for anything that closes the transaction (>= 200)
    pub fn is_final(&self) -> bool {
        self.as_u16() >= 200
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

/// An inbound or outbound SIP request
#[derive(Debug, Clone, PartialEq)]
pub struct SipRequest {
    /// The request method
    pub method: Method,
    /// Request target URI
    pub uri: String,
    /// Stable dialog identifier assigned by the dialog layer
    pub dialog_id: String,
    /// CSeq sequence number
    pub cseq: u32,
    /// Raw Event header value, e.g. `presence;id=abc`
    pub event: Option<String>,
    /// Raw Subscription-State header value, e.g. `active;expires=3600`
    pub subscription_state: Option<String>,
    /// Expires header value, in seconds
    pub expires: Option<u32>,
    /// Additional headers as (name, value) pairs
    pub extra_headers: Vec<(String, String)>,
    /// Message body
    pub body: Bytes,
}

impl SipRequest {
    /// Body as a UTF-8 string, lossy
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Look up an extra header by name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.extra_headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A SIP response, locally built or received from the peer
#[derive(Debug, Clone, PartialEq)]
pub struct SipResponse {
    /// Response status
    pub status: StatusCode,
    /// Dialog identifier copied from the request this answers
    pub dialog_id: String,
    /// CSeq sequence number copied from the request
    pub cseq: u32,
    /// Method of the transaction this response belongs to
    pub cseq_method: Method,
    /// Expires header value, in seconds
    pub expires: Option<u32>,
    /// Additional headers as (name, value) pairs
    pub extra_headers: Vec<(String, String)>,
    /// Message body
    pub body: Bytes,
}

impl SipResponse {
    /// Build a response answering `request` with the given status
    ///
    /// Dialog id and CSeq are carried over so the response can be matched
    /// back to its transaction later.
    pub fn for_request(request: &SipRequest, status: StatusCode) -> Self {
        SipResponse {
            status,
            dialog_id: request.dialog_id.clone(),
            cseq: request.cseq,
            cseq_method: request.method,
            expires: None,
            extra_headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Set the Expires header
    pub fn with_expires(mut self, secs: u32) -> Self {
        self.expires = Some(secs);
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Numeric status code
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }
}
