//! Presence-specific subscription state
//!
//! Holds the current snapshot for a presence subscription. The snapshot
//! is replaced wholesale on every successfully processed NOTIFY; tuples
//! from different NOTIFYs are never merged.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::presence::{PresenceDeviceInfo, PresenceExtension, PresenceNote, PresenceSnapshot};

/// Mutable presence-side state of a subscription
pub struct PresenceState {
    snapshot: Mutex<PresenceSnapshot>,
}

impl PresenceState {
    pub fn new() -> Self {
        PresenceState {
            snapshot: Mutex::new(PresenceSnapshot::new()),
        }
    }

    /// Swap in a freshly parsed snapshot, discarding the previous one
    pub fn replace(&self, snapshot: PresenceSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    /// Copy-on-read view of the whole snapshot
    pub fn snapshot(&self) -> PresenceSnapshot {
        self.snapshot.lock().clone()
    }

    /// Current device map, keyed by tuple id
    pub fn devices(&self) -> HashMap<String, PresenceDeviceInfo> {
        self.snapshot.lock().devices.clone()
    }

    /// Current top-level notes
    pub fn notes(&self) -> Vec<PresenceNote> {
        self.snapshot.lock().notes.clone()
    }

    /// Current top-level extension entries
    pub fn extensions(&self) -> Vec<PresenceExtension> {
        self.snapshot.lock().extensions.clone()
    }
}

impl Default for PresenceState {
    fn default() -> Self {
        Self::new()
    }
}
