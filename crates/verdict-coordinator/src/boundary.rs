//! Ingestion and query boundaries used by review tooling.

use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use verdict_audit::VerificationResult;
use verdict_core::errors::{CoordinatorError, StoreError, VerdictErrorCode};
use verdict_core::events::TamperDetectedEvent;
use verdict_core::models::{
    EventId, FeedbackDraft, FeedbackEvent, FeedbackSource, OperatorVerdict, PolicySnapshot,
    Severity,
};
use verdict_core::traits::CancellationToken;
use verdict_storage::FeedbackReader;

use crate::coordinator::FeedbackLoopCoordinator;
use crate::outcome::IngestionOutcome;

/// Operator feedback as it arrives at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub subject_id: Option<String>,
    pub anomaly_type: Option<String>,
    pub verdict: OperatorVerdict,
    pub severity: Severity,
    #[serde(default)]
    pub confidence_delta: f64,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub mission_phase: Option<String>,
}

impl From<FeedbackSubmission> for FeedbackDraft {
    fn from(s: FeedbackSubmission) -> Self {
        FeedbackDraft {
            subject_id: s.subject_id,
            anomaly_type: s.anomaly_type,
            verdict: s.verdict,
            severity: s.severity,
            confidence_delta: s.confidence_delta,
            raw_text: s.raw_text,
            source: FeedbackSource::Operator,
            mission_phase: s.mission_phase,
        }
    }
}

/// What the submitter is told.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub accepted: bool,
    pub event_id: Option<EventId>,
    /// Final state label, e.g. `acknowledged` or `rejected`.
    pub state: String,
    pub code: Option<String>,
    pub reason: Option<String>,
    pub audit_sequence: Option<u64>,
    pub pinned: Option<bool>,
}

impl From<&IngestionOutcome> for SubmissionResponse {
    fn from(outcome: &IngestionOutcome) -> Self {
        let rejection = outcome.rejection();
        Self {
            accepted: outcome.is_acknowledged(),
            event_id: outcome.event_id,
            state: outcome.state.label().to_string(),
            code: rejection.map(|r| r.code.to_string()),
            reason: rejection.map(|r| r.message.clone()),
            audit_sequence: outcome.audit_sequence,
            pinned: outcome.decision.map(|d| d.is_pinned()),
        }
    }
}

/// Conjunctive filter over stored feedback. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackFilter {
    pub severity: Option<Severity>,
    pub subject_id: Option<String>,
    pub anomaly_type: Option<String>,
    pub verdict: Option<OperatorVerdict>,
    pub source: Option<FeedbackSource>,
    /// Inclusive lower bound on the event timestamp.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl FeedbackFilter {
    pub fn matches(&self, event: &FeedbackEvent) -> bool {
        self.severity.map_or(true, |s| event.severity() == s)
            && self
                .subject_id
                .as_deref()
                .map_or(true, |s| event.subject_id() == s)
            && self
                .anomaly_type
                .as_deref()
                .map_or(true, |a| event.anomaly_type() == a)
            && self.verdict.map_or(true, |v| event.operator_verdict() == v)
            && self.source.map_or(true, |s| event.source() == s)
            && self.since.map_or(true, |t| event.timestamp() >= t)
    }
}

/// Lazy query over the store in append order.
///
/// Corrupt records are passed through as errors so the caller sees them;
/// they do not count towards the limit.
pub struct FeedbackQuery {
    reader: FeedbackReader,
    filter: FeedbackFilter,
    remaining: Option<usize>,
}

impl FeedbackQuery {
    pub(crate) fn new(reader: FeedbackReader, filter: FeedbackFilter) -> Self {
        let remaining = filter.limit;
        Self {
            reader,
            filter,
            remaining,
        }
    }
}

impl Iterator for FeedbackQuery {
    type Item = Result<FeedbackEvent, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            match self.reader.next()? {
                Ok(event) if self.filter.matches(&event) => {
                    if let Some(n) = self.remaining.as_mut() {
                        *n -= 1;
                    }
                    return Some(Ok(event));
                }
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl FeedbackLoopCoordinator {
    /// Ingest one operator submission. Never fails: every problem is
    /// reported in the response.
    pub fn submit_feedback(&self, submission: FeedbackSubmission) -> SubmissionResponse {
        match self.ingest(submission.into(), &CancellationToken::new()) {
            Ok(outcome) => SubmissionResponse::from(&outcome),
            Err(e) => {
                tracing::error!(error = %e, "ingestion aborted");
                SubmissionResponse {
                    accepted: false,
                    event_id: None,
                    state: "aborted".to_string(),
                    code: Some(e.error_code().to_string()),
                    reason: Some(e.to_string()),
                    audit_sequence: None,
                    pinned: None,
                }
            }
        }
    }

    pub fn list_feedback(&self, filter: FeedbackFilter) -> Result<FeedbackQuery, CoordinatorError> {
        Ok(FeedbackQuery::new(self.store.read_all()?, filter))
    }

    /// A committed policy version, or the current one.
    pub fn get_policy(&self, version: Option<u64>) -> Result<Arc<PolicySnapshot>, CoordinatorError> {
        match version {
            None => Ok(self.history.current()),
            Some(v) => Ok(self.history.get(v)?),
        }
    }

    /// Verify a range of the audit chain. A break halts further ingestion
    /// until acknowledged and notifies subscribers.
    pub fn verify_audit(
        &self,
        range: RangeInclusive<u64>,
    ) -> Result<VerificationResult, CoordinatorError> {
        let result = self.ledger.verify(range)?;
        if let VerificationResult::Broken {
            first_break_at,
            reason,
        } = &result
        {
            self.events.emit_tamper_detected(&TamperDetectedEvent {
                first_break_at: *first_break_at,
                reason: reason.clone(),
            });
        }
        Ok(result)
    }
}
