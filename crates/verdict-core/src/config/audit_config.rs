//! Audit ledger configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuditConfig {
    /// Payload keys whose text values are replaced with `[REDACTED]`, in
    /// addition to the built-in list. Numeric values are kept.
    pub extra_sensitive_keys: Vec<String>,
    /// Verify the whole chain when the ledger is opened. Default: true.
    pub verify_on_open: Option<bool>,
}

impl AuditConfig {
    pub fn effective_verify_on_open(&self) -> bool {
        self.verify_on_open.unwrap_or(true)
    }
}
