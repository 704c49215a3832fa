use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{monotonic_now, EventId, OperatorVerdict, Severity};
use crate::constants::{MAX_CONFIDENCE_DELTA, MIN_CONFIDENCE_DELTA};
use crate::errors::ValidationError;
use crate::traits::ISanitizer;

/// Where a piece of feedback came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    /// Submitted by an operator through the ingestion boundary.
    Operator,
    /// Recorded automatically around a recovery action.
    ActionHook,
}

/// An operator correction of an automated verdict.
///
/// Immutable once created: fields are only readable, and the only way to
/// obtain one is [`FeedbackDraft::build`] (or deserializing a stored record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    id: EventId,
    timestamp: DateTime<Utc>,
    subject_id: String,
    anomaly_type: String,
    operator_verdict: OperatorVerdict,
    severity: Severity,
    confidence_delta: f64,
    raw_payload: String,
    source: FeedbackSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mission_phase: Option<String>,
}

impl FeedbackEvent {
    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// The detection dimension this feedback corrects.
    pub fn anomaly_type(&self) -> &str {
        &self.anomaly_type
    }

    pub fn operator_verdict(&self) -> OperatorVerdict {
        self.operator_verdict
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn confidence_delta(&self) -> f64 {
        self.confidence_delta
    }

    /// Sanitized operator text.
    pub fn raw_payload(&self) -> &str {
        &self.raw_payload
    }

    pub fn source(&self) -> FeedbackSource {
        self.source
    }

    pub fn mission_phase(&self) -> Option<&str> {
        self.mission_phase.as_deref()
    }

    /// Re-run the schema checks against a stored or received event.
    /// Stored records can predate a tightened schema, so consumers such as
    /// the policy updater check rather than assume.
    pub fn check_schema(&self) -> Result<(), ValidationError> {
        check_text("subject_id", &self.subject_id)?;
        check_text("anomaly_type", &self.anomaly_type)?;
        check_delta(self.confidence_delta)
    }
}

/// Unvalidated feedback as received at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    pub subject_id: Option<String>,
    pub anomaly_type: Option<String>,
    pub verdict: OperatorVerdict,
    pub severity: Severity,
    pub confidence_delta: f64,
    pub raw_text: String,
    pub source: FeedbackSource,
    pub mission_phase: Option<String>,
}

impl FeedbackDraft {
    pub fn new(
        subject_id: impl Into<String>,
        anomaly_type: impl Into<String>,
        verdict: OperatorVerdict,
        severity: Severity,
    ) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            anomaly_type: Some(anomaly_type.into()),
            verdict,
            severity,
            confidence_delta: 0.0,
            raw_text: String::new(),
            source: FeedbackSource::Operator,
            mission_phase: None,
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.confidence_delta = delta;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = text.into();
        self
    }

    pub fn with_source(mut self, source: FeedbackSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_mission_phase(mut self, phase: impl Into<String>) -> Self {
        self.mission_phase = Some(phase.into());
        self
    }

    /// Check every field without building anything.
    pub fn validate(&self, max_payload_bytes: usize) -> Result<(), ValidationError> {
        let subject = self
            .subject_id
            .as_deref()
            .ok_or(ValidationError::MissingField { field: "subject_id" })?;
        check_text("subject_id", subject)?;

        let anomaly = self
            .anomaly_type
            .as_deref()
            .ok_or(ValidationError::MissingField { field: "anomaly_type" })?;
        check_text("anomaly_type", anomaly)?;

        check_delta(self.confidence_delta)?;

        if self.raw_text.len() > max_payload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                actual: self.raw_text.len(),
                limit: max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Validate, sanitize every operator-supplied text field, and stamp an
    /// id and timestamp.
    ///
    /// The payload limit applies again to the sanitized text, since a
    /// placeholder can be longer than what it replaced. `anomaly_type` names
    /// a policy dimension and is kept verbatim.
    pub fn build(
        self,
        sanitizer: &dyn ISanitizer,
        max_payload_bytes: usize,
    ) -> Result<FeedbackEvent, ValidationError> {
        self.validate(max_payload_bytes)?;
        let (Some(subject_id), Some(anomaly_type)) = (self.subject_id, self.anomaly_type) else {
            return Err(ValidationError::MissingField { field: "subject_id" });
        };

        let raw_payload = sanitizer.sanitize(&self.raw_text).text;
        if raw_payload.len() > max_payload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                actual: raw_payload.len(),
                limit: max_payload_bytes,
            });
        }

        Ok(FeedbackEvent {
            id: EventId::new(),
            timestamp: monotonic_now(),
            subject_id: sanitizer.sanitize(subject_id.trim()).text,
            anomaly_type: anomaly_type.trim().to_string(),
            operator_verdict: self.verdict,
            severity: self.severity,
            confidence_delta: self.confidence_delta,
            raw_payload,
            source: self.source,
            mission_phase: self.mission_phase.map(|phase| sanitizer.sanitize(&phase).text),
        })
    }
}

fn check_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidValue {
            field,
            message: "contains control characters".to_string(),
        });
    }
    Ok(())
}

fn check_delta(delta: f64) -> Result<(), ValidationError> {
    if !delta.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: "confidence_delta",
            message: "must be finite".to_string(),
        });
    }
    if !(MIN_CONFIDENCE_DELTA..=MAX_CONFIDENCE_DELTA).contains(&delta) {
        return Err(ValidationError::InvalidValue {
            field: "confidence_delta",
            message: format!("{delta} outside [{MIN_CONFIDENCE_DELTA}, {MAX_CONFIDENCE_DELTA}]"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NoopSanitizer, SanitizedText};

    fn draft() -> FeedbackDraft {
        FeedbackDraft::new("det-1", "network_anomaly", OperatorVerdict::Confirm, Severity::Low)
    }

    #[test]
    fn missing_subject_is_rejected() {
        let mut d = draft();
        d.subject_id = None;
        assert_eq!(
            d.validate(1024),
            Err(ValidationError::MissingField { field: "subject_id" })
        );
    }

    #[test]
    fn blank_anomaly_type_is_rejected() {
        let mut d = draft();
        d.anomaly_type = Some("   ".into());
        assert!(matches!(
            d.validate(1024),
            Err(ValidationError::MissingField { field: "anomaly_type" })
        ));
    }

    #[test]
    fn nan_and_out_of_range_deltas_are_rejected() {
        assert!(draft().with_delta(f64::NAN).validate(1024).is_err());
        assert!(draft().with_delta(1.5).validate(1024).is_err());
        assert!(draft().with_delta(-1.0).validate(1024).is_ok());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let err = draft().with_text("x".repeat(20)).validate(10).unwrap_err();
        assert_eq!(err, ValidationError::PayloadTooLarge { actual: 20, limit: 10 });
    }

    #[test]
    fn build_assigns_distinct_ids_and_increasing_timestamps() {
        let a = draft().build(&NoopSanitizer, 1024).unwrap();
        let b = draft().build(&NoopSanitizer, 1024).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.timestamp() < b.timestamp());
        assert_eq!(a.subject_id(), "det-1");
    }

    /// Swaps every `ip` for a placeholder longer than itself.
    struct Expanding;

    impl ISanitizer for Expanding {
        fn sanitize(&self, text: &str) -> SanitizedText {
            SanitizedText::clean(text.replace("ip", "[IP_ADDRESS]"))
        }
    }

    #[test]
    fn payload_limit_applies_after_sanitizing() {
        let d = draft().with_text("ip ip");
        assert!(d.validate(16).is_ok());
        let err = d.build(&Expanding, 16).unwrap_err();
        assert_eq!(err, ValidationError::PayloadTooLarge { actual: 25, limit: 16 });
    }

    #[test]
    fn subject_and_phase_are_sanitized_like_the_payload() {
        let mut d = draft().with_mission_phase("ship-ops");
        d.subject_id = Some(" ip-gw-1 ".into());
        let event = d.build(&Expanding, 1024).unwrap();
        assert_eq!(event.subject_id(), "[IP_ADDRESS]-gw-1");
        assert_eq!(event.mission_phase(), Some("sh[IP_ADDRESS]-ops"));
        assert_eq!(event.anomaly_type(), "network_anomaly");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delta_accepted_exactly_within_bounds(delta in prop::num::f64::ANY) {
                let accepted = draft().with_delta(delta).validate(1024).is_ok();
                prop_assert_eq!(accepted, delta.is_finite() && (-1.0..=1.0).contains(&delta));
            }

            #[test]
            fn built_fields_are_trimmed(pad in " {0,4}") {
                let mut d = draft();
                d.subject_id = Some(format!("{pad}det-1{pad}"));
                let event = d.build(&NoopSanitizer, 1024).unwrap();
                prop_assert_eq!(event.subject_id(), "det-1");
            }
        }
    }
}
