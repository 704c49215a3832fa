use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{monotonic_now, EventId};

/// A versioned, immutable set of detection-tuning parameters.
///
/// Snapshots form a linear chain: each one names its parent's version,
/// except the root (version 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub version: u64,
    pub parent_version: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub parameter_map: BTreeMap<String, f64>,
    pub supporting_event_ids: BTreeSet<EventId>,
}

impl PolicySnapshot {
    /// The root of a version chain.
    pub fn root(parameter_map: BTreeMap<String, f64>) -> Self {
        Self {
            version: 0,
            parent_version: None,
            created_at: monotonic_now(),
            parameter_map,
            supporting_event_ids: BTreeSet::new(),
        }
    }

    /// A successor carrying this snapshot's parameters and provenance.
    pub fn successor(&self) -> Self {
        Self {
            version: self.version + 1,
            parent_version: Some(self.version),
            created_at: monotonic_now(),
            parameter_map: self.parameter_map.clone(),
            supporting_event_ids: self.supporting_event_ids.clone(),
        }
    }

    /// Per-parameter change from `parent`. Zero entries are omitted.
    pub fn delta_from(&self, parent: &PolicySnapshot) -> BTreeMap<String, f64> {
        self.parameter_map
            .iter()
            .filter_map(|(key, value)| {
                let before = parent.parameter_map.get(key).copied().unwrap_or(0.0);
                let diff = value - before;
                (diff != 0.0).then(|| (key.clone(), diff))
            })
            .collect()
    }
}
