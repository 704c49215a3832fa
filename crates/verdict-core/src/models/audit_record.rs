use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    Coordinator,
    Store,
    Pinner,
    PolicyUpdater,
    Operator,
}

impl AuditActor {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditActor::Coordinator => "coordinator",
            AuditActor::Store => "store",
            AuditActor::Pinner => "pinner",
            AuditActor::PolicyUpdater => "policy_updater",
            AuditActor::Operator => "operator",
        }
    }
}

/// One link in the append-only, hash-chained audit ledger.
///
/// `this_hash` commits to `prev_hash` and the record body; `prev_hash` of
/// record *n* equals `this_hash` of record *n-1*, or the genesis hash for
/// record 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub sequence_no: u64,
    pub prev_hash: String,
    pub this_hash: String,
    pub actor: AuditActor,
    pub action: String,
    pub recorded_at: DateTime<Utc>,
    /// Redacted payload. Object keys are sorted, so the JSON form is canonical.
    pub payload: serde_json::Value,
}
