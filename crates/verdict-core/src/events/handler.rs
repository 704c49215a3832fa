use super::types::*;

/// Receives feedback-loop lifecycle events. All methods default to no-ops,
/// so handlers implement only what they watch.
pub trait FeedbackEventHandler: Send + Sync {
    fn on_feedback_acknowledged(&self, _event: &FeedbackAcknowledgedEvent) {}
    fn on_feedback_rejected(&self, _event: &FeedbackRejectedEvent) {}
    fn on_events_evicted(&self, _event: &EventsEvictedEvent) {}
    fn on_policy_changed(&self, _event: &PolicyChangedEvent) {}
    fn on_tamper_detected(&self, _event: &TamperDetectedEvent) {}
}
