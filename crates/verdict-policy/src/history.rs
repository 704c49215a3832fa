//! Immutable, linked policy version history.

use std::sync::{Arc, PoisonError, RwLock};

use verdict_core::errors::PolicyError;
use verdict_core::models::PolicySnapshot;

/// Append-only chain of snapshots. Version `base + i` is stored at index `i`.
///
/// Consumers hold `Arc`s, so a snapshot they are using is never changed
/// underneath them by a later commit.
pub struct PolicyHistory {
    base: u64,
    chain: RwLock<Vec<Arc<PolicySnapshot>>>,
}

impl PolicyHistory {
    pub fn new(root: PolicySnapshot) -> Self {
        Self::resume(root)
    }

    /// Continue a chain from a restored head. Versions before it are unknown.
    pub fn resume(head: PolicySnapshot) -> Self {
        Self {
            base: head.version,
            chain: RwLock::new(vec![Arc::new(head)]),
        }
    }

    pub fn current(&self) -> Arc<PolicySnapshot> {
        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);
        // The chain is created with a root and only grows.
        Arc::clone(&chain[chain.len() - 1])
    }

    pub fn get(&self, version: u64) -> Result<Arc<PolicySnapshot>, PolicyError> {
        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);
        version
            .checked_sub(self.base)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| chain.get(i))
            .cloned()
            .ok_or(PolicyError::UnknownVersion(version))
    }

    /// Append `snapshot` if it directly succeeds the current head.
    pub fn commit(&self, snapshot: PolicySnapshot) -> Result<Arc<PolicySnapshot>, PolicyError> {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);
        let head = chain[chain.len() - 1].version;
        if snapshot.parent_version != Some(head) || snapshot.version != head + 1 {
            return Err(PolicyError::BrokenChain {
                version: snapshot.version,
                parent: snapshot.parent_version,
                expected: head,
            });
        }
        let snapshot = Arc::new(snapshot);
        chain.push(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Number of snapshots held, including the first.
    pub fn len(&self) -> usize {
        self.chain.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Never true: the root is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `version` and its known ancestors, newest first.
    pub fn lineage(&self, version: u64) -> Result<Vec<Arc<PolicySnapshot>>, PolicyError> {
        let mut out = vec![self.get(version)?];
        while let Some(parent) = out[out.len() - 1].parent_version {
            if parent < self.base {
                break;
            }
            out.push(self.get(parent)?);
        }
        Ok(out)
    }
}
