//! Error handling for verdict.
//! One error enum per subsystem, `thiserror` only, zero `anyhow`.

pub mod audit_error;
pub mod config_error;
pub mod coordinator_error;
pub mod error_code;
pub mod pinner_error;
pub mod policy_error;
pub mod store_error;
pub mod validation_error;

pub use audit_error::AuditError;
pub use config_error::ConfigError;
pub use coordinator_error::CoordinatorError;
pub use error_code::VerdictErrorCode;
pub use pinner_error::PinnerError;
pub use policy_error::PolicyError;
pub use store_error::StoreError;
pub use validation_error::ValidationError;
