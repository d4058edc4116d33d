//! Error types for the subscription engine
//!
//! Everything here is locally recoverable: a failed NOTIFY or a rejected
//! caller-supplied header never corrupts unrelated subscriptions.

use thiserror::Error;

use crate::presence::pidf::PidfError;

/// Errors surfaced by the subscription engine
#[derive(Error, Debug)]
pub enum SubscribeError {
    /// Caller-supplied header text failed validation before sending
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A second refer subscription was requested for a (dialog, event-id)
    /// pair that already has a live one
    #[error("duplicate refer subscription for dialog {dialog_id} (event id {event_id:?})")]
    DuplicateRefer {
        dialog_id: String,
        event_id: Option<String>,
    },

    /// Requested expiry exceeds the configured policy bound
    #[error("requested expiry {requested}s exceeds maximum {max}s")]
    ExpiryOutOfRange { requested: u32, max: u32 },

    /// The transport collaborator failed to transmit
    #[error("transport failure: {0}")]
    Transport(String),

    /// Presence document could not be parsed
    #[error(transparent)]
    Pidf(#[from] PidfError),

    /// Configuration problem detected at startup
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type used throughout the subscription engine
pub type SubscribeResult<T> = Result<T, SubscribeError>;
