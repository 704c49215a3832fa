use std::collections::{BTreeMap, HashMap};

use verdict_core::models::{EventId, FeedbackEvent};

use crate::retention::RetentionKey;

/// Contents of one severity tier. Always accessed under the tier's mutex.
#[derive(Debug, Default)]
pub(crate) struct TierState {
    by_key: BTreeMap<RetentionKey, FeedbackEvent>,
    keys: HashMap<EventId, RetentionKey>,
}

impl TierState {
    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn contains(&self, id: &EventId) -> bool {
        self.keys.contains_key(id)
    }

    pub(crate) fn insert(&mut self, key: RetentionKey, event: FeedbackEvent) {
        self.keys.insert(key.id, key);
        self.by_key.insert(key, event);
    }

    pub(crate) fn remove(&mut self, id: &EventId) -> Option<FeedbackEvent> {
        let key = self.keys.remove(id)?;
        self.by_key.remove(&key)
    }

    /// Remove and return the lowest-ranked event.
    pub(crate) fn pop_lowest(&mut self) -> Option<FeedbackEvent> {
        let (key, event) = self.by_key.pop_first()?;
        self.keys.remove(&key.id);
        Some(event)
    }

    /// Ids in eviction order.
    pub(crate) fn lowest(&self, n: usize) -> impl Iterator<Item = EventId> + '_ {
        self.by_key.keys().take(n).map(|k| k.id)
    }

    pub(crate) fn events(&self) -> impl Iterator<Item = &FeedbackEvent> {
        self.by_key.values()
    }

    pub(crate) fn clear(&mut self) {
        self.by_key.clear();
        self.keys.clear();
    }
}
