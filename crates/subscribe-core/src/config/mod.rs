//! Engine configuration
//!
//! A `SubscriberConfig` is built once, handed to the `SubscriberManager`,
//! and never mutated afterwards. The strategy-chain order is fixed here and
//! is never re-ordered mid-run.

use crate::routing::EventStrategy;

/// Default subscription duration when the caller does not specify one
pub const DEFAULT_EXPIRES_SECS: u32 = 3600;

/// Maximum subscription duration the engine will request or accept
pub const MAX_EXPIRES_SECS: u32 = 86400;

/// Configuration for the subscription engine
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Default expiry for SUBSCRIBE requests, in seconds
    pub default_expires_secs: u32,
    /// Upper bound on any requested or granted expiry, in seconds
    pub max_expires_secs: u32,
    /// Event package name used for presence subscriptions
    pub presence_package: String,
    /// Dispatch order of the event strategy chain
    pub strategy_order: Vec<EventStrategy>,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        SubscriberConfig {
            default_expires_secs: DEFAULT_EXPIRES_SECS,
            max_expires_secs: MAX_EXPIRES_SECS,
            presence_package: "presence".to_string(),
            strategy_order: vec![
                EventStrategy::Presence,
                EventStrategy::Refer,
                EventStrategy::Conference,
            ],
        }
    }
}

impl SubscriberConfig {
    /// Create a configuration with the conventional defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default SUBSCRIBE expiry
    pub fn with_default_expires(mut self, secs: u32) -> Self {
        self.default_expires_secs = secs;
        self
    }

    /// Set the maximum allowed expiry
    pub fn with_max_expires(mut self, secs: u32) -> Self {
        self.max_expires_secs = secs;
        self
    }

    /// Set the strategy chain order
    pub fn with_strategy_order(mut self, order: Vec<EventStrategy>) -> Self {
        self.strategy_order = order;
        self
    }
}
