//! Audit ledger errors.

use super::error_code::{self, VerdictErrorCode};
use super::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The hash chain does not recompute. Fatal for the affected range.
    #[error("audit chain broken at sequence {first_break_at}: {reason}")]
    Mismatch { first_break_at: u64, reason: String },

    /// Writes are suspended after a detected break until an operator
    /// acknowledges it.
    #[error("audit ledger halted after break at sequence {first_break_at}")]
    Halted { first_break_at: u64 },

    #[error("invalid audit range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("audit storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("audit payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VerdictErrorCode for AuditError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Mismatch { .. } => error_code::AUDIT_MISMATCH,
            Self::Halted { .. } => error_code::AUDIT_HALTED,
            Self::InvalidRange { .. } => error_code::AUDIT_ERROR,
            Self::Storage(e) => e.error_code(),
            Self::Serialization(_) => error_code::SERIALIZATION_ERROR,
        }
    }
}
