//! Coordinator errors.
//! Aggregates subsystem errors via `From` conversions.

use super::error_code::{self, VerdictErrorCode};
use super::{AuditError, ConfigError, PinnerError, PolicyError, StoreError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Pinner error: {0}")]
    Pinner(#[from] PinnerError),

    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The ingestion state machine was asked to skip or reorder a state.
    #[error("illegal ingestion transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

impl VerdictErrorCode for CoordinatorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Audit(e) => e.error_code(),
            Self::Pinner(e) => e.error_code(),
            Self::Policy(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::IllegalTransition { .. } => error_code::ILLEGAL_TRANSITION,
        }
    }
}
