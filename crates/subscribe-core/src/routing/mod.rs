//! Request routing: the event strategy chain and the NOTIFY correlator
//!
//! Everything in this module runs on the transport delivery thread and is
//! non-blocking by contract: map and list lookups plus one queue push,
//! never a wait.

pub mod correlator;
pub mod strategy;

pub use correlator::{correlate_presence, correlate_refer};
pub use strategy::{DispatchOutcome, EventStrategy, StrategyChain};
