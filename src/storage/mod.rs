pub mod locks;
pub mod memory;
pub mod table;

pub use locks::{LockKey, LockManager};
pub use memory::InMemoryStorage;
pub use table::{Table, TableSchema};
