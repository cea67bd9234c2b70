use crate::core::{Result, Row};
use crate::storage::InMemoryStorage;
use crate::transaction::{Change, PendingRow, TransactionId, TransactionManager};
use std::time::Duration;

/// Everything a statement needs: committed state, the owning transaction and
/// how long it may wait for a row lock.
pub struct ExecutionContext<'a> {
    pub storage: &'a InMemoryStorage,
    pub transactions: &'a TransactionManager,
    pub txn_id: TransactionId,
    pub lock_timeout: Duration,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        storage: &'a InMemoryStorage,
        transactions: &'a TransactionManager,
        txn_id: TransactionId,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            transactions,
            txn_id,
            lock_timeout,
        }
    }

    pub async fn lock(&self, table: &str, key: &str) -> Result<()> {
        self.transactions
            .lock_row(self.txn_id, table, key, self.lock_timeout)
            .await
    }

    /// The row under `key` as this transaction sees it: its own pending write
    /// if any, otherwise committed state.
    pub fn visible_row(&self, table: &str, key: &str) -> Result<Option<Row>> {
        match self.transactions.pending_row(self.txn_id, table, key)? {
            PendingRow::Written(row) => Ok(Some(row)),
            PendingRow::Deleted => Ok(None),
            PendingRow::Untouched => self.storage.get_row(table, key),
        }
    }

    /// Committed rows of `table` with this transaction's pending changes laid
    /// over them, ordered by key.
    pub fn visible_rows(&self, table: &str) -> Result<Vec<(String, Row)>> {
        let mut rows: std::collections::BTreeMap<String, Row> =
            self.storage.scan_table(table)?.into_iter().collect();

        for change in self.transactions.pending_changes(self.txn_id, table)? {
            match change.after_image() {
                Some(row) => {
                    rows.insert(change.key().to_string(), row.clone());
                }
                None => {
                    rows.remove(change.key());
                }
            }
        }

        Ok(rows.into_iter().collect())
    }

    pub fn record(&self, change: Change) -> Result<()> {
        self.transactions.record_change(self.txn_id, change)
    }
}
