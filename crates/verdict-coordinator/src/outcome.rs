use serde::Serialize;
use verdict_core::models::EventId;
use verdict_pinner::PinDecision;
use verdict_storage::StoreReceipt;

use crate::state::{IngestionState, RejectReason};

/// Everything the caller learns about one ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionOutcome {
    /// Terminal state.
    pub state: IngestionState,
    /// Every state visited, starting at `Received`.
    pub trail: Vec<IngestionState>,
    /// Assigned once the draft validated.
    pub event_id: Option<EventId>,
    pub receipt: Option<StoreReceipt>,
    pub decision: Option<PinDecision>,
    /// Sequence of the outcome record.
    pub audit_sequence: Option<u64>,
    pub append_attempts: u32,
    /// Cancellation was requested after the event became durable.
    pub cancellation_ignored: bool,
}

impl IngestionOutcome {
    pub fn is_acknowledged(&self) -> bool {
        self.state == IngestionState::Acknowledged
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == IngestionState::Cancelled
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match &self.state {
            IngestionState::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether the event reached the store, whatever the terminal state.
    pub fn persisted(&self) -> bool {
        self.receipt.is_some()
    }
}
