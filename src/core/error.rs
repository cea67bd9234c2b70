use thiserror::Error;

/// Vendor error codes reported by the embedded store.
///
/// The numbering follows the H2 database so that translation tables written
/// for it carry over unchanged.
pub mod codes {
    pub const POOL_TIMEOUT: i32 = 8001;
    pub const DATA_CONVERSION: i32 = 22018;
    pub const NULL_NOT_ALLOWED: i32 = 23502;
    pub const DUPLICATE_KEY: i32 = 23505;
    pub const WRONG_CREDENTIALS: i32 = 28000;
    pub const TABLE_EXISTS: i32 = 42101;
    pub const TABLE_NOT_FOUND: i32 = 42102;
    pub const COLUMN_NOT_FOUND: i32 = 42122;
    pub const GENERAL_ERROR: i32 = 50000;
    pub const LOCK_TIMEOUT: i32 = 50200;
    pub const STATEMENT_CANCELED: i32 = 57014;
    pub const CONNECTION_CLOSED: i32 = 90007;
    pub const PARAMETER_COUNT: i32 = 90012;
    pub const DATABASE_CLOSED: i32 = 90098;
}

/// Errors raised by the store itself, before any repository translation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("Unique index or primary key violation: {key} in table '{table}'")]
    DuplicateKey { table: String, key: String },

    #[error("Column '{0}' cannot be NULL")]
    NullNotAllowed(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Statement expects {expected} parameter(s), got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    #[error("Timeout trying to lock row {key} in table '{table}'")]
    LockTimeout { table: String, key: String },

    #[error("Statement was canceled after {0:?}")]
    StatementTimeout(std::time::Duration),

    #[error("Connection {0} is closed")]
    ConnectionClosed(u64),

    #[error("Database is closed")]
    DatabaseClosed,

    #[error("Wrong user name or password")]
    WrongCredentials,

    #[error("Connection pool timeout: no connection available after {0:?}")]
    PoolTimeout(std::time::Duration),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl DbError {
    /// Vendor code for this error, see [`codes`].
    pub fn code(&self) -> i32 {
        match self {
            DbError::DuplicateKey { .. } => codes::DUPLICATE_KEY,
            DbError::NullNotAllowed(_) => codes::NULL_NOT_ALLOWED,
            DbError::TypeMismatch(_) => codes::DATA_CONVERSION,
            DbError::TableExists(_) => codes::TABLE_EXISTS,
            DbError::TableNotFound(_) => codes::TABLE_NOT_FOUND,
            DbError::ColumnNotFound(..) => codes::COLUMN_NOT_FOUND,
            DbError::ParameterCount { .. } => codes::PARAMETER_COUNT,
            DbError::LockTimeout { .. } => codes::LOCK_TIMEOUT,
            DbError::StatementTimeout(_) => codes::STATEMENT_CANCELED,
            DbError::ConnectionClosed(_) => codes::CONNECTION_CLOSED,
            DbError::DatabaseClosed => codes::DATABASE_CLOSED,
            DbError::WrongCredentials => codes::WRONG_CREDENTIALS,
            DbError::PoolTimeout(_) => codes::POOL_TIMEOUT,
            DbError::ExecutionError(_) | DbError::LockError(_) => codes::GENERAL_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
