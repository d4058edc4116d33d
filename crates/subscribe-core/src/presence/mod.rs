//! # Presence document model
//!
//! Passive data structures for a parsed presence snapshot (RFC 3863 PIDF).
//!
//! A snapshot is the complete presence picture delivered by one NOTIFY:
//! every `<tuple>` becomes one [`PresenceDeviceInfo`], notes and unknown
//! elements directly under `<presence>` land at the top level. Snapshots
//! are whole-document values; a subscription swaps its current snapshot
//! for a new one on every successfully processed NOTIFY and never merges
//! two of them.

pub mod pidf;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SubscribeError;

/// Contact priority value used when the document carries none
pub const DEFAULT_CONTACT_PRIORITY: f64 = -1.0;

/// Basic presence status values as defined in RFC 3863
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BasicStatus {
    /// The principal is available for communication
    Open,
    /// The principal is not available for communication
    Closed,
}

impl fmt::Display for BasicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasicStatus::Open => write!(f, "open"),
            BasicStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for BasicStatus {
    type Err = SubscribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(BasicStatus::Open),
            "closed" => Ok(BasicStatus::Closed),
            _ => Err(SubscribeError::InvalidHeader(format!(
                "Invalid basic status: {}",
                s
            ))),
        }
    }
}

/// A human-readable note with an optional language tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceNote {
    /// Note text
    pub value: String,
    /// `xml:lang` attribute, if present
    pub lang: Option<String>,
}

impl PresenceNote {
    pub fn new(value: impl Into<String>, lang: Option<String>) -> Self {
        PresenceNote {
            value: value.into(),
            lang,
        }
    }
}

/// An element the model does not interpret but must not drop
///
/// Arbitrary namespaced extension content is preserved verbatim so tests
/// can assert on its presence even when the harness cannot interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceExtension {
    /// Qualified element name as it appeared in the document
    pub element: String,
    /// Raw inner content, markup included
    pub content: String,
}

impl PresenceExtension {
    pub fn new(element: impl Into<String>, content: impl Into<String>) -> Self {
        PresenceExtension {
            element: element.into(),
            content: content.into(),
        }
    }
}

/// Presence information for one device/service tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceDeviceInfo {
    /// Tuple id, unique within the snapshot
    pub tuple_id: String,
    /// Basic status; `None` when the tuple carried an empty `<status/>`
    pub basic_status: Option<BasicStatus>,
    /// Contact URI, if present
    pub contact: Option<String>,
    /// Contact priority; [`DEFAULT_CONTACT_PRIORITY`] when absent
    pub contact_priority: f64,
    /// Notes attached to this tuple
    pub notes: Vec<PresenceNote>,
    /// Uninterpreted status and tuple extension elements
    pub extensions: Vec<PresenceExtension>,
    /// Tuple timestamp, if present and well-formed
    pub timestamp: Option<DateTime<Utc>>,
}

impl PresenceDeviceInfo {
    /// Create an entry for a tuple id with everything else unset
    pub fn new(tuple_id: impl Into<String>) -> Self {
        PresenceDeviceInfo {
            tuple_id: tuple_id.into(),
            basic_status: None,
            contact: None,
            contact_priority: DEFAULT_CONTACT_PRIORITY,
            notes: Vec::new(),
            extensions: Vec::new(),
            timestamp: None,
        }
    }
}

/// A complete parsed presence document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// Tuple id to device info
    pub devices: HashMap<String, PresenceDeviceInfo>,
    /// Notes not tied to any tuple
    pub notes: Vec<PresenceNote>,
    /// Uninterpreted elements directly under `<presence>`
    pub extensions: Vec<PresenceExtension>,
}

impl PresenceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a device by tuple id
    pub fn device(&self, tuple_id: &str) -> Option<&PresenceDeviceInfo> {
        self.devices.get(tuple_id)
    }

    /// Number of device entries
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Pretty JSON rendering for diagnostics and test failure output
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn basic_status_round_trip() {
        assert_eq!(BasicStatus::from_str("open").unwrap(), BasicStatus::Open);
        assert_eq!(BasicStatus::from_str("CLOSED").unwrap(), BasicStatus::Closed);
        assert!(BasicStatus::from_str("ajar").is_err());
        assert_eq!(BasicStatus::Open.to_string(), "open");
    }

    #[test]
    fn snapshot_renders_as_json() {
        let mut snapshot = PresenceSnapshot::new();
        snapshot
            .devices
            .insert("desk".to_string(), PresenceDeviceInfo::new("desk"));
        let json = snapshot.to_json();
        assert!(json.contains("\"desk\""));
    }
}
