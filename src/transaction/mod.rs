// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Buffered-write transactions with strict two-phase row locking:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: the change log replayed on commit
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{TransactionInfo, TransactionManager};
pub use state::{PendingRow, Transaction, TransactionId, TransactionState};
