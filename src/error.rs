//! Error taxonomy seen by callers of the repository, the coordinator and the
//! service.
//!
//! Store errors ([`DbError`]) are translated into this type exactly once, at
//! the repository boundary; nothing above it inspects vendor codes.

use crate::core::DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The store could not be reached or no connection was available.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<DbError>,
    },

    #[error("Duplicate key: {key}")]
    DuplicateKey {
        key: String,
        #[source]
        source: DbError,
    },

    #[error("No record with id {id}")]
    NotFound { id: String },

    /// Any other store failure.
    #[error("Store error during {operation}: {source}")]
    Store {
        operation: String,
        #[source]
        source: DbError,
    },

    /// A business rule rejected the unit of work.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The unit of work was rolled back; `source` is what caused it.
    #[error("Transaction rolled back: {source}")]
    TransactionFailed {
        #[source]
        source: Box<Error>,
    },
}

/// Discriminant of [`Error`], used by translation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    DuplicateKey,
    NotFound,
    Store,
    Validation,
    TransactionFailed,
}

impl Error {
    pub fn connection(source: DbError) -> Self {
        Error::Connection {
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn store(operation: impl Into<String>, source: DbError) -> Self {
        Error::Store {
            operation: operation.into(),
            source,
        }
    }

    pub fn transaction_failed(cause: Error) -> Self {
        Error::TransactionFailed {
            source: Box::new(cause),
        }
    }

    /// Build the error of the given kind for a native store failure.
    ///
    /// `key` is the record id the operation addressed.
    pub fn from_native(kind: ErrorKind, operation: &str, key: &str, source: DbError) -> Self {
        match kind {
            ErrorKind::Connection => Error::connection(source),
            ErrorKind::DuplicateKey => Error::DuplicateKey {
                key: key.to_string(),
                source,
            },
            ErrorKind::NotFound => Error::NotFound { id: key.to_string() },
            ErrorKind::Store => Error::store(operation, source),
            ErrorKind::Validation => Error::Validation(source.to_string()),
            ErrorKind::TransactionFailed => {
                Error::transaction_failed(Error::store(operation, source))
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Store { .. } => ErrorKind::Store,
            Error::Validation(_) => ErrorKind::Validation,
            Error::TransactionFailed { .. } => ErrorKind::TransactionFailed,
        }
    }

    /// The innermost error, looking through `TransactionFailed` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::TransactionFailed { source } => source.root_cause(),
            other => other,
        }
    }

    pub fn root_kind(&self) -> ErrorKind {
        self.root_cause().kind()
    }

    /// Vendor code of the underlying store error, if there is one.
    pub fn native_code(&self) -> Option<i32> {
        match self.root_cause() {
            Error::Connection { source, .. } => source.as_ref().map(DbError::code),
            Error::DuplicateKey { source, .. } | Error::Store { source, .. } => Some(source.code()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codes;

    #[test]
    fn test_root_kind_looks_through_wrappers() {
        let cause = Error::from_native(
            ErrorKind::DuplicateKey,
            "insert",
            "A",
            DbError::DuplicateKey {
                table: "member".into(),
                key: "'A'".into(),
            },
        );
        let wrapped = Error::transaction_failed(Error::transaction_failed(cause));

        assert_eq!(wrapped.kind(), ErrorKind::TransactionFailed);
        assert_eq!(wrapped.root_kind(), ErrorKind::DuplicateKey);
        assert_eq!(wrapped.native_code(), Some(codes::DUPLICATE_KEY));
    }

    #[test]
    fn test_from_native_kinds() {
        let err = Error::from_native(ErrorKind::Connection, "acquire", "", DbError::DatabaseClosed);
        assert!(matches!(err, Error::Connection { source: Some(DbError::DatabaseClosed), .. }));

        let err = Error::from_native(ErrorKind::NotFound, "find", "Z", DbError::TableNotFound("member".into()));
        assert!(matches!(err, Error::NotFound { ref id } if id == "Z"));
        assert_eq!(err.native_code(), None);
    }

    #[test]
    fn test_display_carries_cause() {
        let err = Error::transaction_failed(Error::Validation("recipient 'ex' is reserved".into()));
        assert!(err.to_string().contains("recipient 'ex' is reserved"));
        assert_eq!(err.root_kind(), ErrorKind::Validation);
    }
}
