mod audit_record;
mod clock;
mod event_id;
mod feedback_event;
mod policy_snapshot;
mod severity;
mod verdict;

pub use audit_record::{AuditActor, AuditRecord};
pub use clock::monotonic_now;
pub use event_id::EventId;
pub use feedback_event::{FeedbackDraft, FeedbackEvent, FeedbackSource};
pub use policy_snapshot::PolicySnapshot;
pub use severity::Severity;
pub use verdict::OperatorVerdict;
