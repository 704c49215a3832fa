//! Redaction of structured audit payloads.

use serde_json::{Map, Value};
use verdict_core::constants::REDACTED;
use verdict_core::models::EventId;
use verdict_core::traits::ISanitizer;

/// Keys whose values never reach the audit chain.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "credential",
    "api_key",
    "raw_text",
    "raw_payload",
    "operator_notes",
];

/// Redacts a JSON payload before it is hashed into the audit chain.
///
/// Text and structures under sensitive keys (case-insensitive, matched as
/// substrings so `db_password` is caught) become `[REDACTED]`. Numbers,
/// booleans and nulls under such keys are kept: they carry no operator text,
/// and replacing them would corrupt counts and parameter values. Remaining
/// string values run through the sanitizer.
pub struct PayloadRedactor<S: ISanitizer> {
    sanitizer: S,
    sensitive_keys: Vec<String>,
}

impl<S: ISanitizer> PayloadRedactor<S> {
    pub fn new(sanitizer: S, extra_keys: &[String]) -> Self {
        let mut sensitive_keys: Vec<String> =
            DEFAULT_SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect();
        sensitive_keys.extend(extra_keys.iter().map(|k| k.to_ascii_lowercase()));
        sensitive_keys.sort();
        sensitive_keys.dedup();
        Self {
            sanitizer,
            sensitive_keys,
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.sensitive_keys.iter().any(|k| key.contains(k.as_str()))
    }

    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    let redacted = match v {
                        Value::Number(_) | Value::Bool(_) | Value::Null => v.clone(),
                        _ if self.is_sensitive(k) => Value::String(REDACTED.to_string()),
                        _ => self.redact(v),
                    };
                    out.insert(k.clone(), redacted);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            Value::String(s) if is_event_id(s) => value.clone(),
            Value::String(s) => Value::String(self.sanitizer.sanitize(s).text),
            other => other.clone(),
        }
    }
}

/// Hyphenated event ids are opaque and must survive intact for provenance.
/// Other UUID spellings (e.g. 32 bare hex digits) are scanned like any text.
fn is_event_id(s: &str) -> bool {
    s.len() == 36 && s.parse::<EventId>().is_ok()
}
