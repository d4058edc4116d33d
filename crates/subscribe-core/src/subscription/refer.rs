//! Refer-specific subscription state
//!
//! A refer NOTIFY carries a sipfrag body describing how the referred
//! request is progressing. The body is advisory: the engine keeps the
//! last observed fragment for introspection and tolerates anything it
//! cannot read.

use parking_lot::Mutex;

use serde::{Deserialize, Serialize};

/// The `CSeq: <n> <METHOD>` line scanned out of a refer NOTIFY body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferFragment {
    /// CSeq number of the referred transaction
    pub cseq: u32,
    /// Method name of the referred transaction
    pub method: String,
}

/// Mutable refer-side state of a subscription
pub struct ReferState {
    last_fragment: Mutex<Option<ReferFragment>>,
}

impl ReferState {
    pub fn new() -> Self {
        ReferState {
            last_fragment: Mutex::new(None),
        }
    }

    /// Record a scanned fragment; `None` scans leave the previous one
    pub fn observe(&self, fragment: Option<(u32, String)>) {
        if let Some((cseq, method)) = fragment {
            *self.last_fragment.lock() = Some(ReferFragment { cseq, method });
        }
    }

    /// The most recently observed fragment, if any
    pub fn last_fragment(&self) -> Option<ReferFragment> {
        self.last_fragment.lock().clone()
    }
}

impl Default for ReferState {
    fn default() -> Self {
        Self::new()
    }
}
