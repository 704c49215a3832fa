//! Feedback recorded automatically from the outcome of recovery actions.

use std::fmt::Display;

/// Phase attached when the caller does not name one.
pub const DEFAULT_MISSION_PHASE: &str = "NOMINAL_OPS";

/// What a tracked recovery action is acting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    /// Name of the recovery action, e.g. `restart_service`.
    pub action: String,
    /// The fault or verdict the action responds to.
    pub subject_id: String,
    pub anomaly_type: String,
    pub mission_phase: String,
}

impl ActionContext {
    pub fn new(
        action: impl Into<String>,
        subject_id: impl Into<String>,
        anomaly_type: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            subject_id: subject_id.into(),
            anomaly_type: anomaly_type.into(),
            mission_phase: DEFAULT_MISSION_PHASE.to_string(),
        }
    }

    pub fn with_mission_phase(mut self, phase: impl Into<String>) -> Self {
        self.mission_phase = phase.into();
        self
    }
}

/// Whether an action's return value counts as success.
pub trait ActionOutcome {
    fn succeeded(&self) -> bool;

    /// Extra context for a failure.
    fn detail(&self) -> Option<String> {
        None
    }
}

impl ActionOutcome for () {
    fn succeeded(&self) -> bool {
        true
    }
}

impl ActionOutcome for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

impl<T> ActionOutcome for Option<T> {
    fn succeeded(&self) -> bool {
        self.is_some()
    }
}

impl<T, E: Display> ActionOutcome for Result<T, E> {
    fn succeeded(&self) -> bool {
        self.is_ok()
    }

    fn detail(&self) -> Option<String> {
        self.as_ref().err().map(ToString::to_string)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
