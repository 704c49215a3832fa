//! PolicyUpdater: fold feedback into a successor snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use verdict_core::errors::PolicyError;
use verdict_core::models::{FeedbackEvent, PolicySnapshot};

use crate::schema::PolicySchema;

/// Net deltas smaller than this are treated as an exact tie.
const TIE_EPSILON: f64 = 1e-12;

/// What one recompute did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecomputeReport {
    /// Events whose delta was applied.
    pub folded: usize,
    /// Events already in the parent's provenance.
    pub already_applied: usize,
    /// Malformed events or unknown dimensions.
    pub skipped: usize,
    /// Applied change per parameter; zero changes omitted.
    pub delta: BTreeMap<String, f64>,
    /// Clamps applied, as warnings.
    #[serde(skip)]
    pub warnings: Vec<PolicyError>,
}

impl RecomputeReport {
    pub fn is_noop(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Stateless: the parent snapshot is the only input besides the events.
#[derive(Debug, Clone)]
pub struct PolicyUpdater {
    schema: PolicySchema,
}

impl PolicyUpdater {
    pub fn new(schema: PolicySchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &PolicySchema {
        &self.schema
    }

    /// Derive the successor of `parent` from `events`.
    ///
    /// Only events missing from the parent's provenance are folded, so
    /// running this twice over the same set yields a zero delta the second
    /// time. Never fails: malformed events are skipped and out-of-bounds
    /// adjustments are clamped and reported.
    pub fn recompute(
        &self,
        parent: &PolicySnapshot,
        events: &[FeedbackEvent],
    ) -> (PolicySnapshot, RecomputeReport) {
        let mut next = parent.successor();
        let mut report = RecomputeReport::default();
        let mut net: BTreeMap<&str, f64> = BTreeMap::new();

        for event in events {
            if parent.supporting_event_ids.contains(&event.id())
                || next.supporting_event_ids.contains(&event.id())
            {
                report.already_applied += 1;
                continue;
            }
            if event.check_schema().is_err() || !self.schema.contains(event.anomaly_type()) {
                tracing::debug!(event_id = %event.id(), anomaly_type = event.anomaly_type(), "skipping malformed feedback");
                report.skipped += 1;
                continue;
            }
            *net.entry(event.anomaly_type()).or_insert(0.0) += event.confidence_delta();
            next.supporting_event_ids.insert(event.id());
            report.folded += 1;
        }

        for (dimension, requested) in net {
            if requested.abs() < TIE_EPSILON {
                continue;
            }
            let Some(current) = next.parameter_map.get(dimension).copied() else {
                continue;
            };
            let (value, warnings) = self.bounded(dimension, current, requested);
            report.warnings.extend(warnings);
            if value != current {
                next.parameter_map.insert(dimension.to_string(), value);
                report.delta.insert(dimension.to_string(), value - current);
            }
        }

        for warning in &report.warnings {
            tracing::warn!(warning = %warning, version = next.version, "policy adjustment clamped");
        }
        tracing::info!(
            version = next.version,
            folded = report.folded,
            skipped_events = report.skipped,
            changed = report.delta.len(),
            "policy recomputed"
        );
        (next, report)
    }

    /// Apply `requested` to `current` under the step and range bounds.
    fn bounded(&self, dimension: &str, current: f64, requested: f64) -> (f64, Vec<PolicyError>) {
        let mut warnings = Vec::new();
        let max_step = self.schema.max_step();

        let step = requested.clamp(-max_step, max_step);
        if step != requested {
            warnings.push(PolicyError::Bounds {
                parameter: dimension.to_string(),
                requested: current + requested,
                clamped: current + step,
            });
        }

        let stepped = current + step;
        let value = stepped.clamp(self.schema.min_value(), self.schema.max_value());
        if value != stepped {
            warnings.push(PolicyError::Bounds {
                parameter: dimension.to_string(),
                requested: stepped,
                clamped: value,
            });
        }
        (value, warnings)
    }
}
