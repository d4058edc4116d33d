//! Subscription status and expiry tracking

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a subscription
///
/// Transitions are monotonic forward: `Pending -> Active`,
/// `Pending -> Terminated`, `Active -> Active` (refresh) and
/// `Active -> Terminated`. A terminated subscription never goes back; a
/// new subscription object is created for a subsequent fetch or
/// re-subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// SUBSCRIBE/REFER sent, no authoritative answer yet
    Pending,
    /// Subscription accepted and running
    Active,
    /// Subscription over, with an optional reason kept alongside
    Terminated,
}

impl SubscriptionStatus {
    /// Whether the monotonic transition table permits moving to `next`
    pub fn can_advance_to(self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Active)
                | (Pending, Terminated)
                | (Active, Active)
                | (Active, Terminated)
                | (Terminated, Terminated)
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SubscriptionStatus::Terminated)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Terminated => "terminated",
        };
        write!(f, "{}", s)
    }
}

/// Tracks the granted expiry against the moment it was received
///
/// The remaining time is not wall-clock-ticked anywhere; it is recomputed
/// relative to the receipt instant every time it is queried.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryTimer {
    granted_secs: u32,
    set_at: Instant,
}

impl ExpiryTimer {
    /// Start a timer from now for the granted duration
    pub fn new(granted_secs: u32) -> Self {
        ExpiryTimer {
            granted_secs,
            set_at: Instant::now(),
        }
    }

    /// The expiry value that was granted, in seconds
    pub fn granted_secs(&self) -> u32 {
        self.granted_secs
    }

    /// Seconds left before expiry, relative to the receipt instant
    pub fn time_left_secs(&self) -> u32 {
        let elapsed = self.set_at.elapsed().as_secs();
        self.granted_secs.saturating_sub(elapsed.min(u32::MAX as u64) as u32)
    }
}
