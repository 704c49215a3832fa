//! Policy errors.

use super::error_code::{self, VerdictErrorCode};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// An adjustment would have left the configured range. Reported as a
    /// warning: the value is clamped, never rejected.
    #[error("{parameter}: requested {requested}, clamped to {clamped}")]
    Bounds {
        parameter: String,
        requested: f64,
        clamped: f64,
    },

    #[error("policy version {0} not found")]
    UnknownVersion(u64),

    #[error("snapshot v{version} names parent {parent:?}, expected v{expected}")]
    BrokenChain {
        version: u64,
        parent: Option<u64>,
        expected: u64,
    },

    #[error("parameter map does not match schema: {0}")]
    Schema(String),
}

impl VerdictErrorCode for PolicyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Bounds { .. } => error_code::POLICY_BOUNDS,
            _ => error_code::POLICY_ERROR,
        }
    }
}
