//! Retention ordering for evictable events.

use chrono::{DateTime, Utc};
use verdict_core::config::RetentionWeighting;
use verdict_core::models::{EventId, FeedbackEvent};

/// Sort key for eviction: lowest goes first.
///
/// Ordered by weight, then timestamp (older first), then id, so equal
/// weights always evict the oldest event and the order is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RetentionKey {
    pub weight: u32,
    pub timestamp: DateTime<Utc>,
    pub id: EventId,
}

impl RetentionKey {
    pub fn for_event(event: &FeedbackEvent, weighting: RetentionWeighting) -> Self {
        let weight = match weighting {
            RetentionWeighting::Recency => 0,
            // Millis of |delta|: 0..=1000.
            RetentionWeighting::Confidence => (event.confidence_delta().abs() * 1000.0).round() as u32,
            RetentionWeighting::Severity => event.severity().index() as u32,
        };
        Self {
            weight,
            timestamp: event.timestamp(),
            id: event.id(),
        }
    }
}
