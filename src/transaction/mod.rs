// ============================================================================
// Transaction Management Module
// ============================================================================
//
// ACID transactions via an undo journal (Command Pattern): every write made
// through an open Transaction is recorded as a reversible Change; rollback
// replays the journal in reverse, commit discards it. A writer gate held by
// the Transaction serializes save operations.
//
// ============================================================================

pub mod change;
pub mod transaction;

pub use change::Change;
pub use transaction::{Transaction, TransactionId};
