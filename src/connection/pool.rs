use super::{Connection, ResourceProvider, config::ConnectionConfig};
use crate::core::{DbError, Result};
use crate::facade::Database;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Connection pool
///
/// At most `max_connections` connections are leased at once; an acquire that
/// finds no free slot waits up to `connect_timeout` and then fails with a
/// pool timeout. Released connections are parked and reused.
pub struct ConnectionPool {
    config: ConnectionConfig,
    db: Database,
    /// One permit per leasable slot; a leased connection carries its permit.
    slots: Arc<Semaphore>,
    idle: Mutex<VecDeque<IdleConnection>>,
}

/// A parked connection
struct IdleConnection {
    connection: Connection,
    idle_since: Instant,
}

impl IdleConnection {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            idle_since: Instant::now(),
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|lifetime| self.connection.age() > lifetime)
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|timeout| self.idle_since.elapsed() > timeout)
    }
}

impl ConnectionPool {
    /// Build a pool over `db` and open `min_connections` up front.
    pub fn new(db: Database, config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(DbError::ExecutionError)?;

        let pool = Self {
            slots: Arc::new(Semaphore::new(config.max_connections)),
            idle: Mutex::new(VecDeque::with_capacity(config.max_connections)),
            config,
            db,
        };

        pool.ensure_min_connections()?;
        log::info!(
            "Connection pool ready for {} ({} idle, max {})",
            pool.config.to_url(),
            pool.config.min_connections,
            pool.config.max_connections
        );
        Ok(pool)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<Connection> {
        if self.db.is_closed() {
            return Err(DbError::DatabaseClosed);
        }

        let permit = match tokio::time::timeout(
            self.config.connect_timeout,
            Arc::clone(&self.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(DbError::ExecutionError("Connection pool is closed".into()));
            }
            Err(_) => {
                log::warn!(
                    "No connection available after {:?} ({})",
                    self.config.connect_timeout,
                    self.stats()
                );
                return Err(DbError::PoolTimeout(self.config.connect_timeout));
            }
        };

        let mut connection = match self.take_idle()? {
            Some(connection) => connection,
            None => self.db.connect(&self.config)?,
        };
        connection.attach_lease(permit);
        Ok(connection)
    }

    /// Return a connection to the pool
    ///
    /// Any transaction left open is rolled back and auto-commit restored before
    /// the connection is parked. Connections past their lifetime are closed.
    pub fn return_connection(&self, mut connection: Connection) -> Result<()> {
        // The slot is held until the connection is parked, so a waiter woken
        // by the release finds it idle instead of opening another one.
        let Some(lease) = connection.take_lease() else {
            log::warn!(
                "Connection {} was not leased from this pool; closing it",
                connection.id()
            );
            return connection.close();
        };

        if let Err(err) = connection.reset() {
            connection.close()?;
            return Err(err);
        }

        if !connection.is_active() || self.slots.is_closed() {
            return Ok(());
        }

        let parked = IdleConnection::new(connection);
        if parked.is_expired(self.config.max_lifetime) {
            log::debug!("Retiring connection {}", parked.connection.id());
            return Ok(());
        }

        self.idle.lock()?.push_back(parked);
        drop(lease);
        Ok(())
    }

    /// Pop the next usable idle connection, closing stale ones on the way.
    fn take_idle(&self) -> Result<Option<Connection>> {
        let mut idle = self.idle.lock()?;

        while let Some(parked) = idle.pop_front() {
            if parked.is_expired(self.config.max_lifetime)
                || parked.is_idle_too_long(self.config.idle_timeout)
            {
                log::debug!("Evicting stale connection {}", parked.connection.id());
                continue;
            }
            return Ok(Some(parked.connection));
        }

        Ok(None)
    }

    fn ensure_min_connections(&self) -> Result<()> {
        let mut idle = self.idle.lock()?;

        while idle.len() < self.config.min_connections {
            let connection = self.db.connect(&self.config)?;
            idle.push_back(IdleConnection::new(connection));
        }

        Ok(())
    }

    /// Close idle connections and refuse further acquires.
    pub fn close(&self) -> Result<()> {
        self.slots.close();
        self.idle.lock()?.clear();
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().map(|idle| idle.len()).unwrap_or(0);
        let active = self
            .config
            .max_connections
            .saturating_sub(self.slots.available_permits());

        PoolStats {
            total: idle + active,
            idle,
            active,
            max: self.config.max_connections,
        }
    }
}

#[async_trait]
impl ResourceProvider for ConnectionPool {
    async fn acquire(&self) -> Result<Connection> {
        self.get_connection().await
    }

    async fn release(&self, conn: Connection) -> Result<()> {
        self.return_connection(conn)
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub idle: usize,
    pub active: usize,
    pub max: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} idle, max {}",
            self.active, self.total, self.idle, self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_creation() {
        let config = ConnectionConfig::default()
            .min_connections(2)
            .max_connections(5);

        let pool = ConnectionPool::new(Database::new(), config).unwrap();
        let stats = pool.stats();

        assert_eq!(stats.total, 2);
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.max, 5);
    }

    #[tokio::test]
    async fn test_connection_return_to_pool() {
        let config = ConnectionConfig::default()
            .min_connections(1)
            .max_connections(5);

        let pool = ConnectionPool::new(Database::new(), config).unwrap();

        let conn = pool.get_connection().await.unwrap();
        let id = conn.id();
        let stats = pool.stats();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.idle, 0);

        pool.return_connection(conn).unwrap();
        assert_eq!(pool.stats().idle, 1);

        let again = pool.get_connection().await.unwrap();
        assert_eq!(again.id(), id);
    }

    #[tokio::test]
    async fn test_max_connections_limit() {
        let config = ConnectionConfig::default()
            .max_connections(2)
            .connect_timeout(Duration::from_millis(100));

        let pool = ConnectionPool::new(Database::new(), config).unwrap();

        let _conn1 = pool.get_connection().await.unwrap();
        let _conn2 = pool.get_connection().await.unwrap();

        let err = pool.get_connection().await.unwrap_err();
        assert_eq!(err, DbError::PoolTimeout(Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_dropped_connection_frees_slot() {
        let config = ConnectionConfig::default()
            .max_connections(1)
            .connect_timeout(Duration::from_millis(100));

        let pool = ConnectionPool::new(Database::new(), config).unwrap();

        let conn = pool.get_connection().await.unwrap();
        drop(conn);

        assert!(pool.get_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_release_restores_auto_commit() {
        let db = Database::new();
        let pool = ConnectionPool::new(db.clone(), ConnectionConfig::default()).unwrap();

        let mut conn = pool.get_connection().await.unwrap();
        conn.begin().unwrap();
        pool.return_connection(conn).unwrap();

        assert_eq!(db.active_transactions(), 0);
        let conn = pool.get_connection().await.unwrap();
        assert!(conn.is_auto_commit());
    }

    #[tokio::test]
    async fn test_idle_timeout_evicts() {
        let config = ConnectionConfig::default()
            .min_connections(1)
            .idle_timeout(Duration::from_millis(10));

        let pool = ConnectionPool::new(Database::new(), config).unwrap();
        let first_id = {
            let conn = pool.get_connection().await.unwrap();
            let id = conn.id();
            pool.return_connection(conn).unwrap();
            id
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        let conn = pool.get_connection().await.unwrap();
        assert_ne!(conn.id(), first_id);
    }

    #[test]
    fn test_wrong_credentials() {
        let db = Database::with_credentials("admin", "secret");
        let result = ConnectionPool::new(db, ConnectionConfig::new("admin", "nope"));
        assert!(matches!(result, Err(DbError::WrongCredentials)));
    }
}
