use super::{Connection, ResourceProvider, config::ConnectionConfig};
use crate::core::{DbError, Result};
use crate::facade::Database;

use async_trait::async_trait;

/// Opens a fresh connection on every acquire and closes it on release.
pub struct DirectProvider {
    db: Database,
    config: ConnectionConfig,
}

impl DirectProvider {
    pub fn new(db: Database, config: ConnectionConfig) -> Result<Self> {
        config.validate().map_err(DbError::ExecutionError)?;
        Ok(Self { db, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ResourceProvider for DirectProvider {
    async fn acquire(&self) -> Result<Connection> {
        self.db.connect(&self.config)
    }

    async fn release(&self, mut conn: Connection) -> Result<()> {
        log::debug!("Closing connection {}", conn.id());
        conn.close()
    }
}
