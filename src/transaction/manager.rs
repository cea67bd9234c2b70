// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Change, PendingRow, Transaction, TransactionId, TransactionState};
use crate::core::{DbError, Result};
use crate::storage::{InMemoryStorage, LockKey, LockManager};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct TransactionManager {
    transactions: Mutex<HashMap<TransactionId, Transaction>>,
    locks: LockManager,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Result<TransactionId> {
        let transaction_id = TransactionId::new();
        let mut transactions = self.transactions.lock()?;
        transactions.insert(transaction_id, Transaction::new(transaction_id));
        Ok(transaction_id)
    }

    /// Exclusive lock on one row key, held until commit or rollback.
    pub async fn lock_row(
        &self,
        txn_id: TransactionId,
        table: &str,
        key: &str,
        timeout: Duration,
    ) -> Result<()> {
        self.ensure_active(txn_id)?;
        self.locks
            .acquire(txn_id, LockKey::new(table, key), timeout)
            .await
    }

    pub fn pending_row(&self, txn_id: TransactionId, table: &str, key: &str) -> Result<PendingRow> {
        let transactions = self.transactions.lock()?;
        let transaction = transactions
            .get(&txn_id)
            .ok_or_else(|| not_found(txn_id))?;
        Ok(transaction.pending_row(table, key))
    }

    /// Buffered changes touching `table`, oldest first.
    pub fn pending_changes(&self, txn_id: TransactionId, table: &str) -> Result<Vec<Change>> {
        let transactions = self.transactions.lock()?;
        let transaction = transactions
            .get(&txn_id)
            .ok_or_else(|| not_found(txn_id))?;
        Ok(transaction
            .changes()
            .iter()
            .filter(|change| change.table_name() == table)
            .cloned()
            .collect())
    }

    pub fn record_change(&self, txn_id: TransactionId, change: Change) -> Result<()> {
        let mut transactions = self.transactions.lock()?;
        let transaction = transactions
            .get_mut(&txn_id)
            .ok_or_else(|| not_found(txn_id))?;
        transaction.record_change(change)
    }

    /// Apply the change log to `storage` and release the transaction's locks.
    ///
    /// Returns the number of changes applied. Locks are released even when
    /// applying fails; the transaction is gone either way.
    pub fn commit(&self, txn_id: TransactionId, storage: &InMemoryStorage) -> Result<usize> {
        let mut transaction = {
            let mut transactions = self.transactions.lock()?;
            transactions
                .remove(&txn_id)
                .ok_or_else(|| not_found(txn_id))?
        };

        let result = transaction
            .commit()
            .and_then(|changes| storage.apply_changes(&changes).map(|_| changes.len()));

        self.locks.release_all(txn_id);
        result
    }

    /// Discard the change log and release locks.
    ///
    /// Rolling back an unknown transaction is a no-op returning 0.
    pub fn rollback(&self, txn_id: TransactionId) -> Result<usize> {
        let removed = {
            let mut transactions = self.transactions.lock()?;
            transactions.remove(&txn_id)
        };

        let discarded = match removed {
            Some(mut transaction) => transaction.rollback()?,
            None => 0,
        };

        self.locks.release_all(txn_id);
        Ok(discarded)
    }

    pub fn is_active(&self, txn_id: TransactionId) -> bool {
        self.transactions
            .lock()
            .map(|transactions| transactions.contains_key(&txn_id))
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.transactions
            .lock()
            .map(|transactions| transactions.len())
            .unwrap_or(0)
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn get_transaction_info(&self, txn_id: TransactionId) -> Result<Option<TransactionInfo>> {
        let transactions = self.transactions.lock()?;
        Ok(transactions.get(&txn_id).map(|txn| TransactionInfo {
            id: txn.id(),
            state: txn.state(),
            change_count: txn.change_count(),
            duration: txn.duration(),
        }))
    }

    fn ensure_active(&self, txn_id: TransactionId) -> Result<()> {
        if self.is_active(txn_id) {
            Ok(())
        } else {
            Err(not_found(txn_id))
        }
    }
}

fn not_found(txn_id: TransactionId) -> DbError {
    DbError::ExecutionError(format!("Transaction {} not found", txn_id))
}

#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub state: TransactionState,
    pub change_count: usize,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType, Value};
    use crate::storage::TableSchema;

    fn storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage
            .create_table(
                TableSchema::new(
                    "member",
                    vec![
                        Column::new("member_id", DataType::Text),
                        Column::new("money", DataType::Integer),
                    ],
                    "member_id",
                )
                .unwrap(),
            )
            .unwrap();
        storage
    }

    fn insert(id: &str) -> Change {
        Change::InsertRow {
            table: "member".to_string(),
            key: Value::from(id).key_string(),
            row: vec![Value::from(id), Value::Integer(0)],
        }
    }

    #[tokio::test]
    async fn test_commit_applies_and_unlocks() {
        let tm = TransactionManager::new();
        let storage = storage();
        let txn = tm.begin().unwrap();

        tm.lock_row(txn, "member", "s:A", Duration::from_millis(10)).await.unwrap();
        tm.record_change(txn, insert("A")).unwrap();
        assert_eq!(tm.get_transaction_info(txn).unwrap().unwrap().change_count, 1);

        assert_eq!(tm.commit(txn, &storage).unwrap(), 1);
        assert!(!tm.is_active(txn));
        assert_eq!(tm.locks().held_count(), 0);
        assert_eq!(storage.row_count("member").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards() {
        let tm = TransactionManager::new();
        let storage = storage();
        let txn = tm.begin().unwrap();

        tm.lock_row(txn, "member", "s:A", Duration::from_millis(10)).await.unwrap();
        tm.record_change(txn, insert("A")).unwrap();

        assert_eq!(tm.rollback(txn).unwrap(), 1);
        assert_eq!(tm.active_count(), 0);
        assert_eq!(tm.locks().held_count(), 0);
        assert_eq!(storage.row_count("member").unwrap(), 0);
        assert_eq!(tm.rollback(txn).unwrap(), 0);
    }

    #[test]
    fn test_commit_unknown_transaction() {
        let tm = TransactionManager::new();
        assert!(tm.commit(TransactionId::new(), &storage()).is_err());
    }

    #[tokio::test]
    async fn test_lock_requires_active_transaction() {
        let tm = TransactionManager::new();
        let result = tm
            .lock_row(TransactionId::new(), "member", "s:A", Duration::from_millis(10))
            .await;
        assert!(result.is_err());
    }
}
