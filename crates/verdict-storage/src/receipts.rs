use serde::{Deserialize, Serialize};
use verdict_core::models::EventId;

/// Proof of a durable append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReceipt {
    pub event_id: EventId,
    /// Byte offset of the frame header.
    pub offset: u64,
    /// Frame length including the header.
    pub length: u64,
}

/// Result of a compaction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReceipt {
    pub retained: usize,
    pub removed_ids: Vec<EventId>,
    /// Frames dropped because they could not be decoded at all.
    pub dropped_undecodable: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Result of truncating a log back to its last valid frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Complete frames kept.
    pub recovered: usize,
    /// Bytes cut from the tail.
    pub discarded_bytes: u64,
}

impl RecoveryReport {
    pub fn was_clean(&self) -> bool {
        self.discarded_bytes == 0
    }
}
