use crate::connection::{Connection, ConnectionConfig};
use crate::core::{DbError, Result, Value};
use crate::executor::delete::DeleteExecutor;
use crate::executor::dml::InsertExecutor;
use crate::executor::query::QueryExecutor;
use crate::executor::update::UpdateExecutor;
use crate::executor::{ExecutionContext, ExecutorPipeline};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::storage::{InMemoryStorage, TableSchema};
use crate::transaction::{TransactionId, TransactionManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Embedded in-memory store shared by every connection opened on it.
///
/// Cloning is cheap; clones refer to the same tables.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    storage: InMemoryStorage,
    transaction_manager: TransactionManager,
    executor_pipeline: ExecutorPipeline,
    username: String,
    password: String,
    closed: AtomicBool,
    next_connection_id: AtomicU64,
}

impl Database {
    /// A database accepting user `sa` with an empty password.
    pub fn new() -> Self {
        Self::with_credentials("sa", "")
    }

    pub fn with_credentials(username: &str, password: &str) -> Self {
        let mut pipeline = ExecutorPipeline::new();
        pipeline.register(Box::new(InsertExecutor));
        pipeline.register(Box::new(UpdateExecutor::new()));
        pipeline.register(Box::new(DeleteExecutor::new()));
        pipeline.register(Box::new(QueryExecutor::new()));

        Self {
            inner: Arc::new(DatabaseInner {
                storage: InMemoryStorage::new(),
                transaction_manager: TransactionManager::new(),
                executor_pipeline: pipeline,
                username: username.to_string(),
                password: password.to_string(),
                closed: AtomicBool::new(false),
                next_connection_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        if username == self.inner.username && password == self.inner.password {
            Ok(())
        } else {
            Err(DbError::WrongCredentials)
        }
    }

    /// Open a new connection.
    ///
    /// Fails with `DatabaseClosed` after [`shutdown`](Self::shutdown) and with
    /// `WrongCredentials` when the configured user does not match.
    pub fn connect(&self, config: &ConnectionConfig) -> Result<Connection> {
        self.ensure_open()?;
        self.authenticate(&config.username, &config.password)?;

        let id = self.inner.next_connection_id.fetch_add(1, Ordering::SeqCst);
        log::debug!("Opened connection {} to {}", id, config.to_url());
        Ok(Connection::new(id, config, self.clone()))
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.ensure_open()?;
        let name = schema.name().to_string();
        self.inner.storage.create_table(schema)?;
        log::info!("Created table '{}'", name);
        Ok(())
    }

    /// Returns `false` when the table already existed.
    pub fn create_table_if_not_exists(&self, schema: TableSchema) -> Result<bool> {
        match self.create_table(schema) {
            Ok(()) => Ok(true),
            Err(DbError::TableExists(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.inner.storage.table_exists(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.inner.storage.list_tables()
    }

    /// Execute one statement.
    ///
    /// With a transaction id the statement joins that transaction and its row
    /// locks are kept until commit or rollback. Without one it runs in an
    /// implicit transaction committed before returning.
    pub async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        transaction_id: Option<TransactionId>,
        lock_timeout: Duration,
    ) -> Result<QueryResult> {
        self.ensure_open()?;

        if let Some(txn_id) = transaction_id {
            return self.execute_in(txn_id, stmt, params, lock_timeout).await;
        }

        let implicit = ImplicitTransaction::begin(&self.inner.transaction_manager)?;
        let result = self
            .execute_in(implicit.txn_id, stmt, params, lock_timeout)
            .await?;
        implicit.commit(&self.inner.storage)?;
        Ok(result)
    }

    async fn execute_in(
        &self,
        txn_id: TransactionId,
        stmt: &Statement,
        params: &[Value],
        lock_timeout: Duration,
    ) -> Result<QueryResult> {
        let ctx = ExecutionContext::new(
            &self.inner.storage,
            &self.inner.transaction_manager,
            txn_id,
            lock_timeout,
        );
        self.inner.executor_pipeline.execute(stmt, params, &ctx).await
    }

    pub fn begin(&self) -> Result<TransactionId> {
        self.ensure_open()?;
        self.inner.transaction_manager.begin()
    }

    /// Commit: apply buffered changes atomically and release row locks.
    pub fn commit(&self, txn_id: TransactionId) -> Result<usize> {
        if self.is_closed() {
            self.inner.transaction_manager.rollback(txn_id)?;
            return Err(DbError::DatabaseClosed);
        }
        self.inner
            .transaction_manager
            .commit(txn_id, &self.inner.storage)
    }

    /// Rollback is allowed even after shutdown so that locks are always freed.
    pub fn rollback(&self, txn_id: TransactionId) -> Result<usize> {
        self.inner.transaction_manager.rollback(txn_id)
    }

    /// Make the database unreachable: new connections and statements fail.
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            log::info!("Database shut down");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn active_transactions(&self) -> usize {
        self.inner.transaction_manager.active_count()
    }

    /// Number of committed rows in `table`.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        self.inner.storage.row_count(table)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(DbError::DatabaseClosed)
        } else {
            Ok(())
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("tables", &self.list_tables())
            .field("active_transactions", &self.active_transactions())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Auto-commit scope: rolled back on drop unless committed, so a failed or
/// cancelled statement never leaves locks behind.
struct ImplicitTransaction<'a> {
    manager: &'a TransactionManager,
    txn_id: TransactionId,
    finished: bool,
}

impl<'a> ImplicitTransaction<'a> {
    fn begin(manager: &'a TransactionManager) -> Result<Self> {
        Ok(Self {
            manager,
            txn_id: manager.begin()?,
            finished: false,
        })
    }

    fn commit(mut self, storage: &InMemoryStorage) -> Result<usize> {
        self.finished = true;
        self.manager.commit(self.txn_id, storage)
    }
}

impl Drop for ImplicitTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.manager.rollback(self.txn_id) {
                log::warn!("Failed to roll back implicit {}: {}", self.txn_id, err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    const LOCK: Duration = Duration::from_millis(50);

    fn member_schema() -> TableSchema {
        TableSchema::new(
            "member",
            vec![
                Column::new("member_id", DataType::Text),
                Column::new("money", DataType::Integer).not_null(),
            ],
            "member_id",
        )
        .unwrap()
    }

    fn insert() -> Statement {
        Statement::insert("member", &["member_id", "money"])
    }

    #[tokio::test]
    async fn test_autocommit_insert_is_visible() {
        let db = Database::new();
        db.create_table(member_schema()).unwrap();

        db.execute(&insert(), &[Value::from("A"), Value::Integer(1)], None, LOCK)
            .await
            .unwrap();

        assert_eq!(db.row_count("member").unwrap(), 1);
        assert_eq!(db.active_transactions(), 0);
    }

    #[tokio::test]
    async fn test_failed_autocommit_releases_transaction() {
        let db = Database::new();
        db.create_table(member_schema()).unwrap();
        let params = [Value::from("A"), Value::Integer(1)];

        db.execute(&insert(), &params, None, LOCK).await.unwrap();
        let err = db.execute(&insert(), &params, None, LOCK).await.unwrap_err();

        assert_eq!(err.code(), crate::core::codes::DUPLICATE_KEY);
        assert_eq!(db.active_transactions(), 0);
    }

    #[tokio::test]
    async fn test_explicit_transaction_rollback() {
        let db = Database::new();
        db.create_table(member_schema()).unwrap();

        let txn = db.begin().unwrap();
        db.execute(&insert(), &[Value::from("A"), Value::Integer(1)], Some(txn), LOCK)
            .await
            .unwrap();
        assert_eq!(db.row_count("member").unwrap(), 0);

        assert_eq!(db.rollback(txn).unwrap(), 1);
        assert_eq!(db.row_count("member").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_parameter_count() {
        let db = Database::new();
        db.create_table(member_schema()).unwrap();

        let err = db
            .execute(&insert(), &[Value::from("A")], None, LOCK)
            .await
            .unwrap_err();
        assert_eq!(err, DbError::ParameterCount { expected: 2, actual: 1 });
    }

    #[tokio::test]
    async fn test_shutdown() {
        let db = Database::new();
        db.create_table(member_schema()).unwrap();
        assert!(!db.create_table_if_not_exists(member_schema()).unwrap());

        db.shutdown();
        assert!(db.is_closed());
        assert_eq!(
            db.connect(&ConnectionConfig::default()).unwrap_err(),
            DbError::DatabaseClosed
        );
        let err = db
            .execute(&insert(), &[Value::from("A"), Value::Integer(1)], None, LOCK)
            .await
            .unwrap_err();
        assert_eq!(err, DbError::DatabaseClosed);
    }

    #[test]
    fn test_authenticate() {
        let db = Database::with_credentials("admin", "secret");
        assert!(db.authenticate("admin", "secret").is_ok());
        assert_eq!(db.authenticate("admin", "nope"), Err(DbError::WrongCredentials));
        assert!(db.connect(&ConnectionConfig::default()).is_err());
    }
}
