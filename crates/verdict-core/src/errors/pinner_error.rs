//! Pinner errors.

use super::error_code::{self, VerdictErrorCode};
use crate::models::Severity;

#[derive(Debug, thiserror::Error)]
pub enum PinnerError {
    #[error("{tier} tier lock poisoned")]
    Poisoned { tier: Severity },

    #[error("event {event_id} is pinned in the {tier} tier and cannot be evicted")]
    PinnedEviction { event_id: String, tier: Severity },
}

impl VerdictErrorCode for PinnerError {
    fn error_code(&self) -> &'static str {
        error_code::PINNER_ERROR
    }
}
