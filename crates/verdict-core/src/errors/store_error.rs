//! Feedback store errors.

use super::error_code::{self, VerdictErrorCode};

/// Errors raised by the append-only record files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The advisory lock could not be taken within the bounded wait.
    /// Callers treat this as backpressure.
    #[error("lock on {path} not acquired within {waited_ms}ms")]
    LockTimeout { path: String, waited_ms: u64 },

    /// A frame's declared length disagrees with the bytes on disk, typically
    /// a truncated write from a crashed writer. Everything before `offset`
    /// was read successfully.
    #[error("corrupt record at byte {offset} after {recovered} valid records: {details}")]
    Corruption {
        recovered: usize,
        offset: u64,
        details: String,
    },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

impl VerdictErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::LockTimeout { .. } => error_code::LOCK_TIMEOUT,
            Self::Corruption { .. } => error_code::STORE_CORRUPT,
            Self::Io { .. } => error_code::STORE_IO,
            Self::Serialization(_) => error_code::SERIALIZATION_ERROR,
        }
    }
}
