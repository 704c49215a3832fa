use serde::{Deserialize, Serialize};

/// Result of sanitization with metadata about what was redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedText {
    pub text: String,
    pub redactions: Vec<Redaction>,
}

impl SanitizedText {
    /// Text that needed no redaction.
    pub fn clean(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            redactions: Vec::new(),
        }
    }
}

/// A single redaction applied during sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redaction {
    pub category: String,
    pub placeholder: String,
    pub start: usize,
    pub end: usize,
}

/// PII/secret sanitization.
///
/// Implementations must be deterministic: the same input always yields the
/// same output, because audit hashes are computed over sanitized text.
pub trait ISanitizer: Send + Sync {
    /// Sanitize text, replacing PII and secrets with placeholders.
    fn sanitize(&self, text: &str) -> SanitizedText;
}

/// Pass-through sanitizer for callers that sanitize upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSanitizer;

impl ISanitizer for NoopSanitizer {
    fn sanitize(&self, text: &str) -> SanitizedText {
        SanitizedText::clean(text)
    }
}
