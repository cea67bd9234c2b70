// ============================================================================
// memberdb Library
// ============================================================================
//
// Transactional repository over an embedded in-memory store:
//
//   ResourceProvider  -> hands out connections (direct or pooled)
//   MemberRepository  -> parameterized statements on a caller's connection
//   TransactionCoordinator -> begin / one commit or rollback / release
//
// ============================================================================

//! A small unit-of-work library.
//!
//! ```no_run
//! use memberdb::{
//!     ConnectionConfig, ConnectionPool, Database, MemberRepository, MemberService,
//!     TransactionCoordinator,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> memberdb::Result<()> {
//! let db = Database::new();
//! let repository = MemberRepository::default();
//! repository.migrate(&db)?;
//!
//! let pool = ConnectionPool::new(db, ConnectionConfig::default()).map_err(memberdb::Error::connection)?;
//! let service = MemberService::new(TransactionCoordinator::new(Arc::new(pool)), repository);
//!
//! service.create("A", 10_000).await?;
//! service.create("B", 10_000).await?;
//! service.transfer("A", "B", 2_000).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod core;
pub mod error;
mod executor;
pub mod facade;
pub mod repository;
pub mod result;
pub mod service;
pub mod statement;
pub mod storage;
pub mod transaction;
pub mod tx;

pub use crate::core::{DataType, DbError, Value, codes};
pub use error::{Error, ErrorKind, Result};
pub use facade::Database;
pub use result::QueryResult;
pub use statement::Statement;

pub use connection::{
    Connection, ConnectionPool, DirectProvider, PoolStats, ResourceProvider,
    config::ConnectionConfig,
};
pub use repository::{ErrorTranslator, Member, MemberRepository};
pub use service::MemberService;
pub use tx::{TransactionCoordinator, TransactionOutcome};
