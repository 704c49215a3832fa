//! # verdict-policy
//!
//! Folds retained feedback into versioned detection policy snapshots.
//!
//! Each recompute derives a successor of the current snapshot: net operator
//! corrections per detection dimension, step-limited and clamped so no
//! batch can push a parameter outside its safe range. Snapshots are never
//! mutated; [`PolicyHistory`] keeps the linked chain.

pub mod history;
pub mod schema;
pub mod updater;

pub use history::PolicyHistory;
pub use schema::PolicySchema;
pub use updater::{PolicyUpdater, RecomputeReport};
