//! Audited maintenance operations: policy recompute, memory-pressure sweeps,
//! store compaction, and tamper acknowledgment.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use serde_json::{json, Value};
use verdict_core::errors::{AuditError, CoordinatorError};
use verdict_core::events::{EventsEvictedEvent, PolicyChangedEvent};
use verdict_core::models::{AuditActor, AuditRecord, EventId, FeedbackEvent, PolicySnapshot};
use verdict_pinner::MemoryPressure;
use verdict_policy::RecomputeReport;
use verdict_storage::CompactionReceipt;

use crate::coordinator::{FeedbackLoopCoordinator, POLICY_ACTION};

/// A committed policy version and how it was derived.
#[derive(Debug, Clone)]
pub struct PolicyUpdate {
    pub snapshot: Arc<PolicySnapshot>,
    pub report: RecomputeReport,
    pub audit_sequence: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub evicted: Vec<EventId>,
    /// `None` when nothing was nominated and nothing was recorded.
    pub audit_sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionOutcome {
    pub receipt: CompactionReceipt,
    pub audit_sequence: u64,
}

impl FeedbackLoopCoordinator {
    /// Fold the pinner's working set into a successor of the current policy,
    /// record it, and only then make it current.
    ///
    /// Always commits a new version; an empty or fully applied working set
    /// yields a copy of the parent. If the record cannot be written the
    /// current policy is unchanged.
    pub fn recompute_policy(&self) -> Result<PolicyUpdate, CoordinatorError> {
        let _serial = self
            .recompute_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.ensure_writable()?;

        let parent = self.history.current();
        let retained = self.pinner.retained()?;
        let (next, report) = self.updater.recompute(&parent, &retained);

        let record = self
            .ledger
            .record(AuditActor::PolicyUpdater, POLICY_ACTION, policy_payload(&next, &report))?;
        // Only this method commits, under `recompute_lock`, so `next` still
        // succeeds the head it was derived from.
        let snapshot = self.history.commit(next)?;

        tracing::info!(
            policy_version = snapshot.version,
            folded = report.folded,
            skipped_events = report.skipped,
            audit_sequence = record.sequence_no,
            "policy committed"
        );
        self.events.emit_policy_changed(&PolicyChangedEvent {
            version: snapshot.version,
            parent_version: snapshot.parent_version,
            delta: report.delta.clone(),
            skipped: report.skipped,
        });

        Ok(PolicyUpdate {
            snapshot,
            report,
            audit_sequence: record.sequence_no,
        })
    }

    /// Evict the pinner's lowest-retention non-critical events for `pressure`.
    /// Evicted events stay in the store; only the working set shrinks. If the
    /// eviction cannot be recorded the events are admitted again.
    pub fn sweep(&self, pressure: MemoryPressure) -> Result<SweepOutcome, CoordinatorError> {
        self.ensure_writable()?;
        let candidates = self.pinner.evict_candidates(pressure)?;
        if candidates.is_empty() {
            return Ok(SweepOutcome::default());
        }

        let removed = self.pinner.evict(&candidates)?;
        let evicted: Vec<EventId> = removed.iter().map(FeedbackEvent::id).collect();
        let record = match self.ledger.record(
            AuditActor::Pinner,
            "pinner.evicted",
            json!({
                "pressure": pressure,
                "event_ids": evicted.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        ) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, evicted_count = removed.len(), "sweep not recorded; re-admitting");
                for event in removed {
                    self.pinner.admit(event)?;
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            evicted_count = evicted.len(),
            audit_sequence = record.sequence_no,
            "pressure sweep"
        );
        self.events.emit_events_evicted(&EventsEvictedEvent {
            event_ids: evicted.clone(),
            audit_sequence: record.sequence_no,
        });
        Ok(SweepOutcome {
            evicted,
            audit_sequence: Some(record.sequence_no),
        })
    }

    /// Rewrite the feedback log keeping `retain`, every event the current
    /// policy was derived from, and the pinner's working set.
    pub fn compact(&self, retain: &BTreeSet<EventId>) -> Result<CompactionOutcome, CoordinatorError> {
        self.ensure_writable()?;
        let _exclusive = self
            .compaction_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut keep = retain.clone();
        keep.extend(self.history.current().supporting_event_ids.iter().copied());
        keep.extend(self.pinner.retained_ids());

        let receipt = self.store.compact(&keep)?;
        let record = self.ledger.record(
            AuditActor::Store,
            "store.compacted",
            json!({
                "retained": receipt.retained,
                "removed_ids": receipt.removed_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "dropped_undecodable": receipt.dropped_undecodable,
                "bytes_before": receipt.bytes_before,
                "bytes_after": receipt.bytes_after,
            }),
        )?;

        tracing::info!(
            retained = receipt.retained,
            removed = receipt.removed_ids.len(),
            audit_sequence = record.sequence_no,
            "feedback log compacted"
        );
        Ok(CompactionOutcome {
            receipt,
            audit_sequence: record.sequence_no,
        })
    }

    /// Clear a tamper halt after review. `None` if the ledger was not halted.
    pub fn acknowledge_tamper(&self, operator: &str) -> Result<Option<AuditRecord>, CoordinatorError> {
        Ok(self.ledger.acknowledge_tamper(operator)?)
    }

    fn ensure_writable(&self) -> Result<(), CoordinatorError> {
        match self.ledger.halted() {
            Some(first_break_at) => Err(AuditError::Halted { first_break_at }.into()),
            None => Ok(()),
        }
    }
}

/// Payload of a `policy.recomputed` record.
///
/// Parameters and deltas are lists of `{dimension, value}` entries rather
/// than maps, so a dimension name is always data and never a payload key.
pub(crate) fn policy_payload(next: &PolicySnapshot, report: &RecomputeReport) -> Value {
    json!({
        "version": next.version,
        "parent_version": next.parent_version,
        "parameters": dimension_entries(&next.parameter_map),
        "delta": dimension_entries(&report.delta),
        "supporting_event_ids": next
            .supporting_event_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "folded": report.folded,
        "already_applied": report.already_applied,
        "skipped": report.skipped,
    })
}

fn dimension_entries(map: &BTreeMap<String, f64>) -> Vec<Value> {
    map.iter()
        .map(|(dimension, value)| json!({ "dimension": dimension, "value": value }))
        .collect()
}
