//! Coordinator configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Attempts per append before a lock timeout becomes a rejection. Default: 5.
    pub max_append_attempts: Option<u32>,
    /// First retry delay in milliseconds, doubled per attempt. Default: 5.
    pub backoff_base_ms: Option<u64>,
    /// Cap on a single retry delay in milliseconds. Default: 200.
    pub backoff_max_ms: Option<u64>,
    /// Recompute the policy after this many acknowledged events. 0 disables. Default: 100.
    pub recompute_every: Option<u64>,
}

impl CoordinatorConfig {
    pub fn effective_max_append_attempts(&self) -> u32 {
        self.max_append_attempts.unwrap_or(5)
    }

    pub fn effective_backoff_base_ms(&self) -> u64 {
        self.backoff_base_ms.unwrap_or(5)
    }

    pub fn effective_backoff_max_ms(&self) -> u64 {
        self.backoff_max_ms.unwrap_or(200)
    }

    pub fn effective_recompute_every(&self) -> u64 {
        self.recompute_every.unwrap_or(100)
    }
}
