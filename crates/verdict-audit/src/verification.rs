use serde::{Deserialize, Serialize};

/// Outcome of walking a range of the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    /// Every record in range recomputed and linked.
    Ok { checked: u64 },
    /// The first record in range that does not.
    Broken { first_break_at: u64, reason: String },
}

impl VerificationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}
