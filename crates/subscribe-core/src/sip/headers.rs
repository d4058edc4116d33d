//! Header values the subscription engine interprets itself
//!
//! Covers the Event header (RFC 6665), the Subscription-State header, the
//! minimal sipfrag CSeq scan used by refer NOTIFY bodies (RFC 3515), and
//! validation of caller-supplied raw header text.

use std::fmt;

use crate::errors::{SubscribeError, SubscribeResult};

/// Parsed Event header: package name plus optional id parameter
///
/// Wire form: `Event: presence` or `Event: presence;id=abc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Event package name, e.g. `presence`, `refer`, `conference`
    pub package: String,
    /// Optional id parameter disambiguating multiple subscriptions to the
    /// same package
    pub id: Option<String>,
}

impl EventHeader {
    /// Create an Event header without an id parameter
    pub fn new(package: impl Into<String>) -> Self {
        EventHeader {
            package: package.into(),
            id: None,
        }
    }

    /// Create an Event header with an id parameter
    pub fn with_id(package: impl Into<String>, id: impl Into<String>) -> Self {
        EventHeader {
            package: package.into(),
            id: Some(id.into()),
        }
    }

    /// Parse a header value like `presence;id=abc`
    pub fn from_header_value(value: &str) -> SubscribeResult<Self> {
        let mut parts = value.split(';').map(str::trim);
        let package = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SubscribeError::InvalidHeader("empty Event header".to_string()))?
            .to_string();

        let mut id = None;
        for param in parts {
            if let Some(v) = param.strip_prefix("id=") {
                id = Some(v.to_string());
            }
            // Other event parameters are opaque to the harness.
        }
        Ok(EventHeader { package, id })
    }

    /// Serialize back to a header value
    pub fn to_header_value(&self) -> String {
        match &self.id {
            Some(id) => format!("{};id={}", self.package, id),
            None => self.package.clone(),
        }
    }

    /// True if this header names the given event package
    pub fn is_package(&self, package: &str) -> bool {
        self.package.eq_ignore_ascii_case(package)
    }
}

impl fmt::Display for EventHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_header_value())
    }
}

/// Parsed Subscription-State header (RFC 6665 Section 8.2.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStateHeader {
    /// `active[;expires=n]`
    Active { expires: Option<u32> },
    /// `pending`
    Pending,
    /// `terminated[;reason=r]`
    Terminated { reason: Option<String> },
}

impl SubscriptionStateHeader {
    /// Parse a header value like `active;expires=3600` or
    /// `terminated;reason=noresource`
    pub fn from_header_value(value: &str) -> SubscribeResult<Self> {
        let mut parts = value.split(';').map(str::trim);
        let state = parts.next().unwrap_or("");

        let mut expires = None;
        let mut reason = None;
        for param in parts {
            if let Some(v) = param.strip_prefix("expires=") {
                expires = Some(v.parse::<u32>().map_err(|_| {
                    SubscribeError::InvalidHeader(format!(
                        "bad expires parameter in Subscription-State: {}",
                        value
                    ))
                })?);
            } else if let Some(v) = param.strip_prefix("reason=") {
                reason = Some(v.to_string());
            }
        }

        match state.to_ascii_lowercase().as_str() {
            "active" => Ok(SubscriptionStateHeader::Active { expires }),
            "pending" => Ok(SubscriptionStateHeader::Pending),
            "terminated" => Ok(SubscriptionStateHeader::Terminated { reason }),
            other => Err(SubscribeError::InvalidHeader(format!(
                "unknown Subscription-State value: {}",
                other
            ))),
        }
    }

    /// Serialize back to a header value
    pub fn to_header_value(&self) -> String {
        match self {
            SubscriptionStateHeader::Active { expires: Some(n) } => {
                format!("active;expires={}", n)
            }
            SubscriptionStateHeader::Active { expires: None } => "active".to_string(),
            SubscriptionStateHeader::Pending => "pending".to_string(),
            SubscriptionStateHeader::Terminated { reason: Some(r) } => {
                format!("terminated;reason={}", r)
            }
            SubscriptionStateHeader::Terminated { reason: None } => "terminated".to_string(),
        }
    }

    /// True for the `active` state
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStateHeader::Active { .. })
    }

    /// True for the `terminated` state
    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionStateHeader::Terminated { .. })
    }
}

/// Scan a sipfrag body for its `CSeq: <n> <METHOD>` line
///
/// Refer NOTIFY bodies are advisory; anything malformed or missing simply
/// yields `None` rather than an error.
pub fn parse_sipfrag_cseq(body: &[u8]) -> Option<(u32, String)> {
    let text = std::str::from_utf8(body).ok()?;
    for line in text.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed
            .strip_prefix("CSeq:")
            .or_else(|| trimmed.strip_prefix("cseq:"))
        else {
            continue;
        };
        let mut fields = rest.split_whitespace();
        let number = fields.next()?.parse::<u32>().ok()?;
        let method = fields.next()?.to_string();
        return Some((number, method));
    }
    None
}

/// Validate caller-supplied raw header text and split it into (name, value)
///
/// The grammar check is the one the header parser downstream would apply:
/// a header without a colon has "no HCOLON" and the send must be aborted.
pub fn split_raw_header(raw: &str) -> SubscribeResult<(String, String)> {
    let colon = raw.find(':').ok_or_else(|| {
        SubscribeError::InvalidHeader(format!("no HCOLON in header field: {}", raw))
    })?;
    let name = raw[..colon].trim();
    let value = raw[colon + 1..].trim();
    if name.is_empty() {
        return Err(SubscribeError::InvalidHeader(format!(
            "empty header name: {}",
            raw
        )));
    }
    Ok((name.to_string(), value.to_string()))
}
