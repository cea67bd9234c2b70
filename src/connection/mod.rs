pub mod config;
pub mod direct;
pub mod pool;
pub mod provider;

use crate::core::{DbError, Result, Value};
use crate::facade::Database;
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::transaction::TransactionId;
pub use config::ConnectionConfig;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;

pub use direct::DirectProvider;
pub use pool::{ConnectionPool, PoolStats};
pub use provider::ResourceProvider;

/// Database connection handle
///
/// Bound to zero or one transaction at a time. While no transaction is open
/// every statement commits on its own (auto-commit).
#[derive(Debug)]
pub struct Connection {
    id: u64,
    username: String,
    db: Database,
    state: ConnectionState,
    transaction_id: Option<TransactionId>,
    statement_timeout: Option<Duration>,
    lock_timeout: Duration,
    created_at: Instant,
    /// Pool capacity held by this connection; dropping it frees the slot.
    lease: Option<OwnedSemaphorePermit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Active,
    InTransaction,
    Closed,
}

impl Connection {
    pub(crate) fn new(id: u64, config: &ConnectionConfig, db: Database) -> Self {
        Self {
            id,
            username: config.username.clone(),
            db,
            state: ConnectionState::Active,
            transaction_id: None,
            statement_timeout: config.statement_timeout,
            lock_timeout: config.lock_timeout,
            created_at: Instant::now(),
            lease: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Execute a parameterized statement
    ///
    /// Values are bound positionally to the statement's placeholders. When a
    /// statement timeout is configured and expires, the statement is cancelled
    /// and any open transaction on this connection is rolled back.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let stmt = Statement::update_by_key("member", &["money"]);
    /// let result = conn.execute(&stmt, &[Value::from(8000), Value::from("A")]).await?;
    /// assert_eq!(result.affected_rows, 1);
    /// ```
    pub async fn execute(&mut self, stmt: &Statement, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;

        let Some(limit) = self.statement_timeout else {
            return self
                .db
                .execute(stmt, params, self.transaction_id, self.lock_timeout)
                .await;
        };

        let outcome = tokio::time::timeout(
            limit,
            self.db
                .execute(stmt, params, self.transaction_id, self.lock_timeout),
        )
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Connection {}: statement cancelled after {:?}: {}",
                    self.id,
                    limit,
                    stmt
                );
                if self.is_in_transaction() {
                    self.rollback()?;
                }
                Err(DbError::StatementTimeout(limit))
            }
        }
    }

    /// Start a transaction; auto-commit is off until commit or rollback.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;

        if self.state == ConnectionState::InTransaction {
            return Err(DbError::ExecutionError("Transaction already active".into()));
        }

        self.transaction_id = Some(self.db.begin()?);
        self.state = ConnectionState::InTransaction;
        Ok(())
    }

    /// Commit the current transaction
    ///
    /// The connection is back in auto-commit mode afterwards even if the
    /// commit fails; a failed commit leaves nothing applied.
    pub fn commit(&mut self) -> Result<()> {
        let txn_id = self.take_transaction()?;
        self.db.commit(txn_id)?;
        Ok(())
    }

    /// Rollback the current transaction
    pub fn rollback(&mut self) -> Result<()> {
        let txn_id = self.take_transaction()?;
        self.db.rollback(txn_id)?;
        Ok(())
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == ConnectionState::InTransaction
    }

    pub fn is_auto_commit(&self) -> bool {
        self.state == ConnectionState::Active
    }

    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Closed
    }

    /// Close the connection, rolling back an open transaction.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ConnectionState::InTransaction {
            self.rollback()?;
        }

        self.state = ConnectionState::Closed;
        self.lease = None;
        Ok(())
    }

    /// Roll back anything left open and restore auto-commit.
    pub(crate) fn reset(&mut self) -> Result<()> {
        if self.is_in_transaction() {
            log::warn!(
                "Connection {} returned with an open transaction; rolling back",
                self.id
            );
            self.rollback()?;
        }
        Ok(())
    }

    pub(crate) fn attach_lease(&mut self, lease: OwnedSemaphorePermit) {
        self.lease = Some(lease);
    }

    pub(crate) fn take_lease(&mut self) -> Option<OwnedSemaphorePermit> {
        self.lease.take()
    }

    fn take_transaction(&mut self) -> Result<TransactionId> {
        if self.state != ConnectionState::InTransaction {
            return Err(DbError::ExecutionError("No active transaction".into()));
        }

        self.state = ConnectionState::Active;
        self.transaction_id
            .take()
            .ok_or_else(|| DbError::ExecutionError("No active transaction".into()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(DbError::ConnectionClosed(self.id));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.is_in_transaction() {
            log::warn!(
                "Connection {} dropped with an open transaction; rolling back",
                self.id
            );
        }
        let _ = self.close();
    }
}
