//! # verdict-pinner
//!
//! Decides which feedback events stay in memory for policy recompute.
//!
//! Critical and high severity events are pinned unconditionally. Medium,
//! low and info events live in capacity-bounded tiers and are evicted
//! synchronously on admission once their tier is full. Each tier has its own
//! exclusive section, so admissions to different tiers never contend.

pub mod pinner;
pub mod pressure;
pub mod retention;
mod tier;

pub use pinner::{FeedbackPinner, PinDecision, RebuildReport};
pub use pressure::MemoryPressure;
pub use retention::RetentionKey;
