//! Top-level verdict configuration with layered resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AuditConfig, CoordinatorConfig, PinnerConfig, PolicyConfig, StoreConfig};
use crate::errors::ConfigError;

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Environment variables (`VERDICT_*`)
/// 2. Project config (`verdict.toml` in the project root)
/// 3. User config (`~/.verdict/config.toml`)
/// 4. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerdictConfig {
    pub store: StoreConfig,
    pub audit: AuditConfig,
    pub pinner: PinnerConfig,
    pub policy: PolicyConfig,
    pub coordinator: CoordinatorConfig,
}

impl VerdictConfig {
    /// Load configuration with layered resolution rooted at `root`.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Lowest priority: user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        ::tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        let project_config_path = root.join("verdict.toml");
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &VerdictConfig) -> Result<(), ConfigError> {
        if config.store.effective_lock_timeout_ms() == 0 {
            return Err(invalid("store.lock_timeout_ms", "must be greater than 0"));
        }
        if config.store.effective_lock_poll_ms() == 0 {
            return Err(invalid("store.lock_poll_ms", "must be greater than 0"));
        }
        if config.store.effective_max_payload_bytes() == 0 {
            return Err(invalid("store.max_payload_bytes", "must be greater than 0"));
        }

        for (field, capacity) in [
            ("pinner.medium_capacity", config.pinner.effective_medium_capacity()),
            ("pinner.low_capacity", config.pinner.effective_low_capacity()),
            ("pinner.info_capacity", config.pinner.effective_info_capacity()),
        ] {
            if capacity == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        let policy = &config.policy;
        let step = policy.effective_max_step();
        if !step.is_finite() || step <= 0.0 {
            return Err(invalid("policy.max_step", "must be a positive number"));
        }
        let (min, max) = (policy.effective_min_value(), policy.effective_max_value());
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(invalid("policy.min_value", "must be finite and <= policy.max_value"));
        }
        for (key, value) in &policy.parameters {
            if key.trim().is_empty() {
                return Err(invalid("policy.parameters", "parameter names must be non-empty"));
            }
            if !(min..=max).contains(value) {
                return Err(ConfigError::ValidationFailed {
                    field: format!("policy.parameters.{key}"),
                    message: format!("initial value {value} outside [{min}, {max}]"),
                });
            }
        }

        if config.coordinator.effective_max_append_attempts() == 0 {
            return Err(invalid("coordinator.max_append_attempts", "must be at least 1"));
        }
        if config.coordinator.effective_backoff_base_ms()
            > config.coordinator.effective_backoff_max_ms()
        {
            return Err(invalid(
                "coordinator.backoff_base_ms",
                "must not exceed coordinator.backoff_max_ms",
            ));
        }
        Ok(())
    }

    /// Directory for the record files, relative paths resolved against `root`.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        match &self.store.data_dir {
            Some(dir) if Path::new(dir).is_absolute() => PathBuf::from(dir),
            Some(dir) => root.join(dir),
            None => root.join(".verdict"),
        }
    }

    /// Returns the user config path: `~/.verdict/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        home_dir().map(|h| h.join(".verdict").join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored (forward-compatible).
    fn merge_toml_file(config: &mut VerdictConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: VerdictConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`, where `other` values override `base` values
    /// only when `other` has a `Some` (or non-empty) value.
    fn merge(base: &mut VerdictConfig, other: &VerdictConfig) {
        // Store
        if other.store.data_dir.is_some() {
            base.store.data_dir = other.store.data_dir.clone();
        }
        if other.store.lock_timeout_ms.is_some() {
            base.store.lock_timeout_ms = other.store.lock_timeout_ms;
        }
        if other.store.lock_poll_ms.is_some() {
            base.store.lock_poll_ms = other.store.lock_poll_ms;
        }
        if other.store.fsync.is_some() {
            base.store.fsync = other.store.fsync;
        }
        if other.store.max_payload_bytes.is_some() {
            base.store.max_payload_bytes = other.store.max_payload_bytes;
        }

        // Audit
        if !other.audit.extra_sensitive_keys.is_empty() {
            base.audit.extra_sensitive_keys = other.audit.extra_sensitive_keys.clone();
        }
        if other.audit.verify_on_open.is_some() {
            base.audit.verify_on_open = other.audit.verify_on_open;
        }

        // Pinner
        if other.pinner.medium_capacity.is_some() {
            base.pinner.medium_capacity = other.pinner.medium_capacity;
        }
        if other.pinner.low_capacity.is_some() {
            base.pinner.low_capacity = other.pinner.low_capacity;
        }
        if other.pinner.info_capacity.is_some() {
            base.pinner.info_capacity = other.pinner.info_capacity;
        }
        if other.pinner.retention_weighting.is_some() {
            base.pinner.retention_weighting = other.pinner.retention_weighting;
        }

        // Policy
        if other.policy.max_step.is_some() {
            base.policy.max_step = other.policy.max_step;
        }
        if other.policy.min_value.is_some() {
            base.policy.min_value = other.policy.min_value;
        }
        if other.policy.max_value.is_some() {
            base.policy.max_value = other.policy.max_value;
        }
        if !other.policy.parameters.is_empty() {
            base.policy.parameters = other.policy.parameters.clone();
        }

        // Coordinator
        if other.coordinator.max_append_attempts.is_some() {
            base.coordinator.max_append_attempts = other.coordinator.max_append_attempts;
        }
        if other.coordinator.backoff_base_ms.is_some() {
            base.coordinator.backoff_base_ms = other.coordinator.backoff_base_ms;
        }
        if other.coordinator.backoff_max_ms.is_some() {
            base.coordinator.backoff_max_ms = other.coordinator.backoff_max_ms;
        }
        if other.coordinator.recompute_every.is_some() {
            base.coordinator.recompute_every = other.coordinator.recompute_every;
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `VERDICT_STORE_LOCK_TIMEOUT_MS`, `VERDICT_POLICY_MAX_STEP`, etc.
    fn apply_env_overrides(config: &mut VerdictConfig) {
        if let Ok(val) = std::env::var("VERDICT_STORE_DATA_DIR") {
            config.store.data_dir = Some(val);
        }
        if let Ok(val) = std::env::var("VERDICT_STORE_LOCK_TIMEOUT_MS") {
            if let Ok(v) = val.parse::<u64>() {
                config.store.lock_timeout_ms = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_STORE_FSYNC") {
            if let Ok(v) = val.parse::<bool>() {
                config.store.fsync = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_PINNER_MEDIUM_CAPACITY") {
            if let Ok(v) = val.parse::<usize>() {
                config.pinner.medium_capacity = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_PINNER_LOW_CAPACITY") {
            if let Ok(v) = val.parse::<usize>() {
                config.pinner.low_capacity = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_PINNER_INFO_CAPACITY") {
            if let Ok(v) = val.parse::<usize>() {
                config.pinner.info_capacity = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_POLICY_MAX_STEP") {
            if let Ok(v) = val.parse::<f64>() {
                config.policy.max_step = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_COORDINATOR_MAX_APPEND_ATTEMPTS") {
            if let Ok(v) = val.parse::<u32>() {
                config.coordinator.max_append_attempts = Some(v);
            }
        }
        if let Ok(val) = std::env::var("VERDICT_COORDINATOR_RECOMPUTE_EVERY") {
            if let Ok(v) = val.parse::<u64>() {
                config.coordinator.recompute_every = Some(v);
            }
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationFailed {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
