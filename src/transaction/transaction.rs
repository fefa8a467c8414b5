use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::OwnedMutexGuard;

use super::Change;

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TX_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Handle for one open transaction.
///
/// Holds the backend's writer gate for its whole lifetime, so exactly one
/// save operation mutates storage at a time; commit drops the journal,
/// rollback replays it in reverse. Matches the engine model of one
/// transaction per save operation, nothing cross-operation.
pub struct Transaction {
    id: TransactionId,
    changes: Vec<Change>,
    _gate: OwnedMutexGuard<()>,
}

impl Transaction {
    pub(crate) fn new(gate: OwnedMutexGuard<()>) -> Self {
        Self {
            id: TransactionId::next(),
            changes: Vec::new(),
            _gate: gate,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub(crate) fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }
}
