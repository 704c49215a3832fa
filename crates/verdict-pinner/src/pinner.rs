//! FeedbackPinner: tier-scoped admission and eviction.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use verdict_core::config::{PinnerConfig, RetentionWeighting};
use verdict_core::errors::PinnerError;
use verdict_core::models::{EventId, FeedbackEvent, Severity};

use crate::pressure::MemoryPressure;
use crate::retention::RetentionKey;
use crate::tier::TierState;

/// Evictable tiers, lowest first.
const EVICTABLE: [Severity; 3] = [Severity::Info, Severity::Low, Severity::Medium];

/// Outcome of one admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PinDecision {
    /// Critical or high: retained unconditionally.
    Pinned,
    /// Retained subject to capacity. `evicted` names the event the admission
    /// displaced, which may be the admitted event itself if it ranks lowest.
    Deferred { evicted: Option<EventId> },
}

impl PinDecision {
    pub fn is_pinned(&self) -> bool {
        matches!(self, PinDecision::Pinned)
    }

    pub fn evicted(&self) -> Option<EventId> {
        match self {
            PinDecision::Pinned => None,
            PinDecision::Deferred { evicted } => *evicted,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub admitted: usize,
    pub evicted: Vec<EventId>,
}

/// In-memory working set of feedback, partitioned by severity tier.
///
/// Each tier has its own mutex. An admission holds exactly one tier lock,
/// and overflow eviction happens inside that same section, so a tier never
/// exceeds its capacity as observed by any other caller.
pub struct FeedbackPinner {
    tiers: [Mutex<TierState>; 5],
    capacities: [usize; 5],
    weighting: RetentionWeighting,
    /// Event id to tier, for routing `evict` and `contains`.
    index: DashMap<EventId, Severity>,
}

impl FeedbackPinner {
    pub fn new(config: &PinnerConfig) -> Self {
        let mut capacities = [usize::MAX; 5];
        capacities[Severity::Info.index()] = config.effective_info_capacity();
        capacities[Severity::Low.index()] = config.effective_low_capacity();
        capacities[Severity::Medium.index()] = config.effective_medium_capacity();
        Self {
            tiers: Default::default(),
            capacities,
            weighting: config.effective_retention_weighting(),
            index: DashMap::new(),
        }
    }

    /// Admit an event. Re-admitting a retained id changes nothing.
    pub fn admit(&self, event: FeedbackEvent) -> Result<PinDecision, PinnerError> {
        let severity = event.severity();
        let id = event.id();
        let key = RetentionKey::for_event(&event, self.weighting);

        let mut tier = self.lock(severity)?;
        if !tier.contains(&id) {
            tier.insert(key, event);
            self.index.insert(id, severity);
        }
        if severity.is_always_pinned() {
            return Ok(PinDecision::Pinned);
        }

        let mut evicted = None;
        if tier.len() > self.capacities[severity.index()] {
            if let Some(displaced) = tier.pop_lowest() {
                self.index.remove(&displaced.id());
                evicted = Some(displaced.id());
            }
        }
        drop(tier);

        if let Some(evicted) = evicted {
            tracing::debug!(tier = %severity, %evicted, evicted_count = 1, "tier full, evicted on admission");
        }
        Ok(PinDecision::Deferred { evicted })
    }

    /// Nominate evictable events for `pressure`, lowest tier first and
    /// lowest retention rank first within a tier. Never includes pinned tiers.
    pub fn evict_candidates(&self, pressure: MemoryPressure) -> Result<Vec<EventId>, PinnerError> {
        let quota = pressure.quota(self.non_critical_len()?);
        let mut out = Vec::with_capacity(quota);
        for severity in EVICTABLE {
            if out.len() >= quota {
                break;
            }
            let tier = self.lock(severity)?;
            out.extend(tier.lowest(quota - out.len()));
        }
        Ok(out)
    }

    /// Remove `ids` from the working set and hand back the removed events.
    /// Fails without removing anything if any id belongs to a pinned tier.
    /// Unknown ids are ignored.
    pub fn evict(&self, ids: &[EventId]) -> Result<Vec<FeedbackEvent>, PinnerError> {
        let routed: Vec<(EventId, Severity)> = ids
            .iter()
            .filter_map(|id| self.index.get(id).map(|s| (*id, *s)))
            .collect();
        if let Some((id, tier)) = routed.iter().find(|(_, s)| s.is_always_pinned()) {
            return Err(PinnerError::PinnedEviction {
                event_id: id.to_string(),
                tier: *tier,
            });
        }

        let mut removed = Vec::with_capacity(routed.len());
        for severity in EVICTABLE {
            let mut tier = self.lock(severity)?;
            for (id, _) in routed.iter().filter(|(_, s)| *s == severity) {
                if let Some(event) = tier.remove(id) {
                    self.index.remove(id);
                    removed.push(event);
                }
            }
        }
        tracing::debug!(evicted_count = removed.len(), "evicted on sweep");
        Ok(removed)
    }

    /// Take back an admission that was never acknowledged, whatever its tier.
    ///
    /// This is the only way an event leaves a pinned tier. `None` if the id is
    /// not retained.
    pub fn withdraw(&self, id: &EventId) -> Result<Option<FeedbackEvent>, PinnerError> {
        let Some(severity) = self.index.get(id).map(|s| *s) else {
            return Ok(None);
        };
        let removed = self.lock(severity)?.remove(id);
        if removed.is_some() {
            self.index.remove(id);
            tracing::debug!(tier = %severity, event_id = %id, "admission withdrawn");
        }
        Ok(removed)
    }

    /// Every retained event, oldest first.
    ///
    /// Tiers are read one at a time, so concurrent admissions may or may not
    /// be reflected.
    pub fn retained(&self) -> Result<Vec<FeedbackEvent>, PinnerError> {
        let mut out = Vec::new();
        for severity in Severity::ALL {
            out.extend(self.lock(severity)?.events().cloned());
        }
        out.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()).then(a.id().cmp(&b.id())));
        Ok(out)
    }

    pub fn retained_ids(&self) -> BTreeSet<EventId> {
        self.index.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.index.contains_key(id)
    }

    /// Drop the working set and re-admit `events` in order, as after a restart.
    pub fn rebuild(
        &self,
        events: impl IntoIterator<Item = FeedbackEvent>,
    ) -> Result<RebuildReport, PinnerError> {
        for severity in Severity::ALL {
            self.lock(severity)?.clear();
        }
        self.index.clear();

        let mut report = RebuildReport::default();
        for event in events {
            let decision = self.admit(event)?;
            report.admitted += 1;
            if let Some(evicted) = decision.evicted() {
                report.evicted.push(evicted);
            }
        }
        tracing::info!(admitted = report.admitted, evicted_count = report.evicted.len(), "pinner rebuilt");
        Ok(report)
    }

    pub fn tier_len(&self, severity: Severity) -> Result<usize, PinnerError> {
        Ok(self.lock(severity)?.len())
    }

    /// Retained critical and high events.
    pub fn pinned_len(&self) -> Result<usize, PinnerError> {
        Ok(self.tier_len(Severity::Critical)? + self.tier_len(Severity::High)?)
    }

    pub fn non_critical_len(&self) -> Result<usize, PinnerError> {
        EVICTABLE
            .iter()
            .try_fold(0, |acc, s| Ok(acc + self.tier_len(*s)?))
    }

    /// Hard ceiling on retained non-critical events.
    pub fn ceiling(&self) -> usize {
        EVICTABLE.iter().map(|s| self.capacities[s.index()]).sum()
    }

    pub fn capacity(&self, severity: Severity) -> Option<usize> {
        (!severity.is_always_pinned()).then(|| self.capacities[severity.index()])
    }

    fn lock(&self, severity: Severity) -> Result<MutexGuard<'_, TierState>, PinnerError> {
        self.tiers[severity.index()]
            .lock()
            .map_err(|_| PinnerError::Poisoned { tier: severity })
    }
}
