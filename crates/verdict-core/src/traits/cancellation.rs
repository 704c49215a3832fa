//! Cancellation of an in-flight ingestion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A submitter's request to abandon an ingestion.
///
/// Clones share one flag, so the submitter keeps a clone and hands the
/// original to the coordinator. The coordinator only consults it at
/// checkpoints before the event is durable; a request that arrives later
/// is reported back and otherwise ignored.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    requested: Arc<AtomicBool>,
}

/// Returned by [`CancellationToken::checkpoint`] once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ingestion cancelled by the submitter")]
pub struct Cancelled;

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to stop. Idempotent.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once requested, so checkpoints read as `token.checkpoint()?`.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
