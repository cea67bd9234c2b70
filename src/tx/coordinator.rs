use crate::connection::{Connection, ResourceProvider};
use crate::error::{Error, Result};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOutcome {
    Committed,
    RolledBack,
}

/// Runs units of work inside one transaction on one connection.
///
/// The coordinator owns the handle for the whole unit: it acquires it, begins,
/// commits or rolls back exactly once, and releases it on every path.
pub struct TransactionCoordinator<P> {
    provider: Arc<P>,
}

impl<P> Clone for TransactionCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: ResourceProvider> TransactionCoordinator<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Run `work` in a transaction and return its value.
    ///
    /// Any error from `work` rolls the transaction back and comes back wrapped
    /// in [`Error::TransactionFailed`]. A failure to obtain a connection is
    /// returned as [`Error::Connection`] since nothing was started.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let repo = repository.clone();
    /// let member = coordinator
    ///     .run_in_transaction(move |conn| Box::pin(async move { repo.find_by_id(conn, "A").await }))
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send,
    {
        self.run_in_transaction_with_outcome(work).await.1
    }

    /// Like [`run_in_transaction`](Self::run_in_transaction), also reporting
    /// whether the unit committed.
    pub async fn run_in_transaction_with_outcome<T, F>(
        &self,
        work: F,
    ) -> (TransactionOutcome, Result<T>)
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>> + Send,
    {
        let mut conn = match self.provider.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = %err, "could not acquire a connection");
                return (TransactionOutcome::RolledBack, Err(Error::connection(err)));
            }
        };

        let span = tracing::info_span!("transaction", connection = conn.id());
        let (outcome, result) = run_unit(&mut conn, work).instrument(span).await;

        let id = conn.id();
        if let Err(err) = self.provider.release(conn).await {
            tracing::warn!(connection = id, error = %err, "failed to release connection");
        }

        (outcome, result)
    }
}

async fn run_unit<T, F>(conn: &mut Connection, work: F) -> (TransactionOutcome, Result<T>)
where
    F: for<'c> FnOnce(&'c mut Connection) -> BoxFuture<'c, Result<T>>,
{
    if let Err(err) = conn.begin() {
        tracing::error!(error = %err, "could not begin transaction");
        return (TransactionOutcome::RolledBack, Err(Error::connection(err)));
    }
    tracing::debug!("transaction started");

    match work(conn).await {
        Ok(value) => match conn.commit() {
            Ok(()) => {
                tracing::debug!("transaction committed");
                (TransactionOutcome::Committed, Ok(value))
            }
            Err(err) => {
                tracing::warn!(error = %err, "commit failed; nothing was applied");
                (
                    TransactionOutcome::RolledBack,
                    Err(Error::transaction_failed(Error::store("commit", err))),
                )
            }
        },
        Err(cause) => {
            if conn.is_in_transaction() {
                if let Err(err) = conn.rollback() {
                    tracing::warn!(error = %err, "rollback failed");
                }
            }
            tracing::info!(error = %cause, "transaction rolled back");
            (TransactionOutcome::RolledBack, Err(Error::transaction_failed(cause)))
        }
    }
}
