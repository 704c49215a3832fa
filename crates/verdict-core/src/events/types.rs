use std::collections::BTreeMap;

use crate::models::{EventId, Severity};

#[derive(Debug, Clone)]
pub struct FeedbackAcknowledgedEvent {
    pub event_id: EventId,
    pub severity: Severity,
    pub pinned: bool,
    pub audit_sequence: u64,
}

#[derive(Debug, Clone)]
pub struct FeedbackRejectedEvent {
    pub subject_id: Option<String>,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EventsEvictedEvent {
    pub event_ids: Vec<EventId>,
    pub audit_sequence: u64,
}

#[derive(Debug, Clone)]
pub struct PolicyChangedEvent {
    pub version: u64,
    pub parent_version: Option<u64>,
    pub delta: BTreeMap<String, f64>,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct TamperDetectedEvent {
    pub first_break_at: u64,
    pub reason: String,
}
