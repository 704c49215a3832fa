use verdict_core::traits::{ISanitizer, SanitizedText};

use crate::degradation::DegradationTracker;
use crate::patterns;

/// Privacy engine that replaces PII and secrets in operator text with
/// bracketed placeholders.
///
/// Sanitization is deterministic and idempotent: placeholders are never
/// re-matched, so `sanitize(sanitize(x)) == sanitize(x)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrivacyEngine;

impl PrivacyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Sanitize and report which patterns failed to compile.
    pub fn sanitize_with_tracking(&self, text: &str) -> (SanitizedText, DegradationTracker) {
        let mut tracker = DegradationTracker::new();
        check_pattern_health(&mut tracker);
        if tracker.has_failures() {
            tracing::warn!(
                failed = tracker.failures().len(),
                "privacy engine running with degraded pattern set"
            );
        }
        (self.sanitize(text), tracker)
    }
}

impl ISanitizer for PrivacyEngine {
    fn sanitize(&self, text: &str) -> SanitizedText {
        let matches = patterns::scan_all(text);
        if matches.is_empty() {
            return SanitizedText::clean(text);
        }
        let redactions = patterns::to_redactions(&matches);
        SanitizedText {
            text: apply_replacements(text, &matches),
            redactions,
        }
    }
}

fn check_pattern_health(tracker: &mut DegradationTracker) {
    for pat in patterns::pii::all_patterns() {
        if pat.regex.is_none() {
            tracker.record_failure(pat.name, "pii");
        }
    }
    for pat in patterns::secrets::all_patterns() {
        if pat.regex.is_none() {
            tracker.record_failure(pat.name, "secret");
        }
    }
}

/// Matches must be sorted descending by start and non-overlapping.
fn apply_replacements(text: &str, matches: &[patterns::RawMatch]) -> String {
    let mut result = text.to_string();
    for m in matches {
        if m.end <= result.len() {
            result.replace_range(m.start..m.end, m.placeholder);
        }
    }
    result
}
