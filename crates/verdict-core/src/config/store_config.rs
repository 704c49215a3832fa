//! Feedback store configuration.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_PAYLOAD_BYTES;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `feedback.log` and `audit.chain`.
    pub data_dir: Option<String>,
    /// Bounded wait for the advisory lock, in milliseconds. Default: 2000.
    pub lock_timeout_ms: Option<u64>,
    /// Poll interval while waiting for the lock, in milliseconds. Default: 2.
    pub lock_poll_ms: Option<u64>,
    /// `sync_data` after every append. Default: true.
    pub fsync: Option<bool>,
    /// Largest accepted raw payload in bytes. Default: 16 KiB.
    pub max_payload_bytes: Option<usize>,
}

impl StoreConfig {
    pub fn effective_lock_timeout_ms(&self) -> u64 {
        self.lock_timeout_ms.unwrap_or(2_000)
    }

    pub fn effective_lock_poll_ms(&self) -> u64 {
        self.lock_poll_ms.unwrap_or(2)
    }

    pub fn effective_fsync(&self) -> bool {
        self.fsync.unwrap_or(true)
    }

    pub fn effective_max_payload_bytes(&self) -> usize {
        self.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}
