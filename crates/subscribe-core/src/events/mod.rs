//! Thread handoff primitives
//!
//! Everything upstream of these types runs on the transport delivery
//! thread; everything downstream runs on a test thread. The queue is the
//! single synchronization boundary of the engine.

pub mod response_tracker;
pub mod wait_queue;

pub use response_tracker::ResponseTracker;
pub use wait_queue::WaitQueue;
