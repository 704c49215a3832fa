//! # verdict-core
//!
//! Foundation crate for the verdict feedback loop.
//! Defines the data model, error taxonomy, configuration, tracing setup,
//! lifecycle events, and the traits shared across the workspace.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod models;
pub mod traits;
pub mod tracing;

// Re-export the most commonly used types at the crate root.
pub use config::VerdictConfig;
pub use errors::{
    AuditError, ConfigError, CoordinatorError, PinnerError, PolicyError, StoreError,
    ValidationError, VerdictErrorCode,
};
pub use models::{
    AuditRecord, EventId, FeedbackDraft, FeedbackEvent, FeedbackSource, OperatorVerdict,
    PolicySnapshot, Severity,
};
