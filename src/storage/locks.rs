// ============================================================================
// Row Lock Manager
// ============================================================================
//
// Exclusive row locks owned by transactions. A lock is held until its owner
// commits or rolls back (strict two-phase locking). Waiters park on a shared
// Notify and re-check after every release; the wait is bounded so that lock
// cycles resolve as lock timeouts.
//
// ============================================================================

use crate::core::{DbError, Result};
use crate::transaction::TransactionId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    pub table: String,
    pub key: String,
}

impl LockKey {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct LockManager {
    held: Mutex<HashMap<LockKey, TransactionId>>,
    released: Notify,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock on `key` for `owner`, waiting at most `timeout`.
    ///
    /// Re-entrant: an owner already holding the lock gets it immediately.
    pub async fn acquire(&self, owner: TransactionId, key: LockKey, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking so a release in between is not missed.
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut held = self.held.lock()?;
                let blocked = matches!(held.get(&key), Some(holder) if *holder != owner);
                if !blocked {
                    held.insert(key, owner);
                    return Ok(());
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                log::debug!("{} timed out waiting for {}/{}", owner, key.table, key.key);
                return Err(DbError::LockTimeout {
                    table: key.table,
                    key: key.key,
                });
            }
        }
    }

    /// Drop every lock held by `owner` and wake all waiters.
    ///
    /// Synchronous so it can run from `Drop`.
    pub fn release_all(&self, owner: TransactionId) -> usize {
        let released = match self.held.lock() {
            Ok(mut held) => {
                let before = held.len();
                held.retain(|_, holder| *holder != owner);
                before - held.len()
            }
            Err(poisoned) => {
                let mut held = poisoned.into_inner();
                let before = held.len();
                held.retain(|_, holder| *holder != owner);
                before - held.len()
            }
        };

        if released > 0 {
            self.released.notify_waiters();
        }
        released
    }

    pub fn holder(&self, key: &LockKey) -> Option<TransactionId> {
        self.held.lock().ok().and_then(|held| held.get(key).copied())
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().map(|held| held.len()).unwrap_or(0)
    }
}
