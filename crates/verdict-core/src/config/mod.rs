//! Configuration system for verdict.
//! TOML-based, layered resolution: env > project > user > defaults.

pub mod audit_config;
pub mod coordinator_config;
pub mod pinner_config;
pub mod policy_config;
pub mod store_config;
pub mod verdict_config;

pub use audit_config::AuditConfig;
pub use coordinator_config::CoordinatorConfig;
pub use pinner_config::{PinnerConfig, RetentionWeighting};
pub use policy_config::PolicyConfig;
pub use store_config::StoreConfig;
pub use verdict_config::VerdictConfig;
