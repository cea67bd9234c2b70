use super::Connection;
use crate::core::Result;

use async_trait::async_trait;

/// Source of connection handles.
///
/// `release` takes the handle by value: once released it cannot be used or
/// released again.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Hand out a connection in auto-commit mode.
    ///
    /// Fails when the store is unreachable or no capacity frees up in time.
    async fn acquire(&self) -> Result<Connection>;

    /// Take a connection back, either parking it for reuse or closing it.
    async fn release(&self, conn: Connection) -> Result<()>;
}
