//! VerdictErrorCode trait for boundary conversion.

/// Every error enum implements this to provide a stable, structured error
/// code string for callers on the far side of the ingestion and query
/// boundaries.
pub trait VerdictErrorCode {
    /// Returns the error code string (e.g., "LOCK_TIMEOUT").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted boundary string: `[ERROR_CODE] message`.
    fn boundary_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const LOCK_TIMEOUT: &str = "LOCK_TIMEOUT";
pub const STORE_CORRUPT: &str = "STORE_CORRUPT";
pub const STORE_IO: &str = "STORE_IO";
pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
pub const AUDIT_MISMATCH: &str = "AUDIT_MISMATCH";
pub const AUDIT_HALTED: &str = "AUDIT_HALTED";
pub const AUDIT_ERROR: &str = "AUDIT_ERROR";
pub const PINNER_ERROR: &str = "PINNER_ERROR";
pub const POLICY_BOUNDS: &str = "POLICY_BOUNDS";
pub const POLICY_ERROR: &str = "POLICY_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const ILLEGAL_TRANSITION: &str = "ILLEGAL_TRANSITION";
