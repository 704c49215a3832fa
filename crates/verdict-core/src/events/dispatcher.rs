//! EventDispatcher: synchronous event dispatch with zero overhead when empty.

use std::sync::Arc;

use super::handler::FeedbackEventHandler;
use super::types::*;

/// Synchronous event dispatcher wrapping a list of handlers.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn FeedbackEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn FeedbackEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Emit an event to all registered handlers.
    /// A panicking handler is logged and does not stop later handlers.
    fn emit<F: Fn(&dyn FeedbackEventHandler)>(&self, f: F) {
        for (index, handler) in self.handlers.iter().enumerate() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(handler.as_ref());
            }));
            if result.is_err() {
                ::tracing::error!(handler = index, "event handler panicked");
            }
        }
    }

    pub fn emit_feedback_acknowledged(&self, event: &FeedbackAcknowledgedEvent) {
        self.emit(|h| h.on_feedback_acknowledged(event));
    }

    pub fn emit_feedback_rejected(&self, event: &FeedbackRejectedEvent) {
        self.emit(|h| h.on_feedback_rejected(event));
    }

    pub fn emit_events_evicted(&self, event: &EventsEvictedEvent) {
        self.emit(|h| h.on_events_evicted(event));
    }

    pub fn emit_policy_changed(&self, event: &PolicyChangedEvent) {
        self.emit(|h| h.on_policy_changed(event));
    }

    pub fn emit_tamper_detected(&self, event: &TamperDetectedEvent) {
        self.emit(|h| h.on_tamper_detected(event));
    }
}
