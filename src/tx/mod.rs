pub mod coordinator;

pub use coordinator::{TransactionCoordinator, TransactionOutcome};
