//! In-memory log of rejected submissions.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entries kept before the oldest are dropped.
pub const DEFAULT_REJECTION_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionEntry {
    pub at: DateTime<Utc>,
    pub subject_id: Option<String>,
    pub code: &'static str,
    pub message: String,
    /// Whether the event had already reached the store.
    pub persisted: bool,
}

/// Bounded, process-local. Rejections never reach the audit chain, which
/// only records actions that happened.
#[derive(Debug)]
pub struct RejectionLog {
    capacity: usize,
    entries: Mutex<VecDeque<RejectionEntry>>,
}

impl RejectionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, entry: RejectionEntry) {
        tracing::warn!(
            subject_id = entry.subject_id.as_deref().unwrap_or("<missing>"),
            code = entry.code,
            persisted = entry.persisted,
            reason = %entry.message,
            "feedback rejected"
        );
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<RejectionEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RejectionLog {
    fn default() -> Self {
        Self::new(DEFAULT_REJECTION_CAPACITY)
    }
}
