//! # verdict-audit
//!
//! Append-only, hash-chained audit ledger.
//!
//! Each record commits to its predecessor's hash, so altering any stored
//! byte breaks verification at that record. Payloads are redacted before
//! hashing and redaction is deterministic, so a clean chain always
//! re-verifies.

pub mod chain;
pub mod intent;
pub mod ledger;
pub mod verification;

pub use chain::{canonical_json, chain_hash};
pub use intent::IntentToken;
pub use ledger::AuditLedger;
pub use verification::VerificationResult;
