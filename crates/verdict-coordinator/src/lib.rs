//! # verdict-coordinator
//!
//! Owns the lifecycle of every piece of operator feedback, from submission
//! through durable storage, retention, and audit, and exposes the query
//! boundary used by review tooling.
//!
//! Ingestion is an explicit state machine:
//!
//! ```text
//! Received -> AuditedIntent -> Persisted -> PinEvaluated -> AuditedOutcome -> Acknowledged
//! ```
//!
//! Nothing is acknowledged without having been persisted and audited.

pub mod action_hook;
pub mod backoff;
pub mod boundary;
pub mod coordinator;
pub mod maintenance;
pub mod outcome;
pub mod rejection_log;
pub mod state;

pub use action_hook::{ActionContext, ActionOutcome, DEFAULT_MISSION_PHASE};
pub use backoff::Backoff;
pub use boundary::{FeedbackFilter, FeedbackQuery, FeedbackSubmission, SubmissionResponse};
pub use coordinator::{FeedbackLoopCoordinator, INGEST_ACTION, POLICY_ACTION};
pub use maintenance::{CompactionOutcome, PolicyUpdate, SweepOutcome};
pub use outcome::IngestionOutcome;
pub use rejection_log::{RejectionEntry, RejectionLog};
pub use state::{IngestionState, RejectReason, Trail};
