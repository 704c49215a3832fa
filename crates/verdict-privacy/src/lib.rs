//! # verdict-privacy
//!
//! PII and secret redaction engine.
//! Regex patterns for emails, phone numbers, card numbers, API keys, tokens,
//! and connection strings. Replacement is deterministic and idempotent, so
//! audit hashes computed over redacted text re-verify.

pub mod degradation;
pub mod engine;
pub mod patterns;
pub mod payload;

pub use engine::PrivacyEngine;
pub use payload::{PayloadRedactor, DEFAULT_SENSITIVE_KEYS};
