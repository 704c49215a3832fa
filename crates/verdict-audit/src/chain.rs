//! Pure hashing functions for the audit chain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use verdict_core::models::{AuditActor, AuditRecord};

/// `blake3(prev_hash ‖ body)` as lowercase hex.
pub fn chain_hash(prev_hash: &str, canonical_body: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonical_body.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// Copy of `value` whose objects are built in sorted key order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// The hashed portion of a record: everything except the two hashes.
pub fn record_body(
    sequence_no: u64,
    actor: AuditActor,
    action: &str,
    recorded_at: DateTime<Utc>,
    payload: &Value,
) -> String {
    let body = serde_json::json!({
        "sequence_no": sequence_no,
        "actor": actor.as_str(),
        "action": action,
        "recorded_at": recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        "payload": payload,
    });
    canonical_json(&body)
}

/// Recompute a stored record's hash from its fields.
pub fn recompute(record: &AuditRecord) -> String {
    let body = record_body(
        record.sequence_no,
        record.actor,
        &record.action,
        record.recorded_at,
        &record.payload,
    );
    chain_hash(&record.prev_hash, &body)
}
