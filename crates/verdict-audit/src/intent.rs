use serde::{Deserialize, Serialize};
use verdict_core::models::AuditActor;

/// Commitment to an operation that has not happened yet.
///
/// Staging an intent writes nothing. The outcome record carries `digest`
/// as `intent_digest`, so the ledger shows exactly one record per completed
/// operation while still binding it to what was intended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentToken {
    pub actor: AuditActor,
    pub action: String,
    pub digest: String,
}
