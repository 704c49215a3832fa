//! The per-event ingestion state machine.

use std::fmt;

use serde::Serialize;
use verdict_core::errors::CoordinatorError;

/// Why an ingestion ended in `Rejected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectReason {
    /// Stable error code, e.g. `VALIDATION_ERROR` or `LOCK_TIMEOUT`.
    pub code: &'static str,
    pub message: String,
}

/// One state of an ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestionState {
    Received,
    /// The intent digest is staged with the ledger.
    AuditedIntent,
    /// The event is durable in the store.
    Persisted,
    PinEvaluated,
    /// The outcome record is in the ledger.
    AuditedOutcome,
    Acknowledged,
    Rejected(RejectReason),
    Cancelled,
}

impl IngestionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::AuditedIntent => "audited_intent",
            Self::Persisted => "persisted",
            Self::PinEvaluated => "pin_evaluated",
            Self::AuditedOutcome => "audited_outcome",
            Self::Acknowledged => "acknowledged",
            Self::Rejected(_) => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Rejected(_) | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal step.
    ///
    /// Cancellation is only honored before the event is durable. Rejection
    /// is possible before persistence (validation, halted ledger, lock
    /// budget exhausted) and after it (the event is durable but could not be
    /// retained or audited, and the caller is told so).
    pub fn can_transition_to(&self, next: &IngestionState) -> bool {
        use IngestionState::*;
        matches!(
            (self, next),
            (Received, AuditedIntent)
                | (AuditedIntent, Persisted)
                | (Persisted, PinEvaluated)
                | (PinEvaluated, AuditedOutcome)
                | (AuditedOutcome, Acknowledged)
                | (Received | AuditedIntent, Cancelled)
                | (Received | AuditedIntent | Persisted | PinEvaluated, Rejected(_))
        )
    }
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "rejected({})", reason.code),
            other => f.write_str(other.label()),
        }
    }
}

/// The states one ingestion has visited, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trail {
    visited: Vec<IngestionState>,
}

impl Trail {
    pub fn new() -> Self {
        Self {
            visited: vec![IngestionState::Received],
        }
    }

    pub fn current(&self) -> &IngestionState {
        // Never empty: starts at Received.
        &self.visited[self.visited.len() - 1]
    }

    pub fn advance(&mut self, next: IngestionState) -> Result<(), CoordinatorError> {
        if !self.current().can_transition_to(&next) {
            return Err(CoordinatorError::IllegalTransition {
                from: self.current().to_string(),
                to: next.to_string(),
            });
        }
        self.visited.push(next);
        Ok(())
    }

    /// Whether the event reached the store.
    pub fn persisted(&self) -> bool {
        self.visited.contains(&IngestionState::Persisted)
    }

    pub fn into_states(self) -> Vec<IngestionState> {
        self.visited
    }
}

impl Default for Trail {
    fn default() -> Self {
        Self::new()
    }
}
