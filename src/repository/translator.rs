use crate::core::{DbError, codes};
use crate::error::{Error, ErrorKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type TranslateFn = dyn Fn(&DbError) -> Option<ErrorKind> + Send + Sync;

/// Maps native store errors to [`ErrorKind`]s.
///
/// Lookup order: the custom function (if any), then the code table, then the
/// fallback kind.
#[derive(Clone)]
pub struct ErrorTranslator {
    codes: HashMap<i32, ErrorKind>,
    custom: Option<Arc<TranslateFn>>,
    fallback: ErrorKind,
}

impl ErrorTranslator {
    /// An empty table: every error becomes `fallback`.
    pub fn new(fallback: ErrorKind) -> Self {
        Self {
            codes: HashMap::new(),
            custom: None,
            fallback,
        }
    }

    /// Table for the H2-numbered codes the store reports.
    pub fn h2() -> Self {
        Self::new(ErrorKind::Store)
            .with_code(codes::DUPLICATE_KEY, ErrorKind::DuplicateKey)
            .with_code(codes::CONNECTION_CLOSED, ErrorKind::Connection)
            .with_code(codes::DATABASE_CLOSED, ErrorKind::Connection)
            .with_code(codes::WRONG_CREDENTIALS, ErrorKind::Connection)
            .with_code(codes::POOL_TIMEOUT, ErrorKind::Connection)
    }

    pub fn with_code(mut self, code: i32, kind: ErrorKind) -> Self {
        self.codes.insert(code, kind);
        self
    }

    pub fn with_fallback(mut self, kind: ErrorKind) -> Self {
        self.fallback = kind;
        self
    }

    /// Consult `f` before the code table; `None` falls through to it.
    pub fn with_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&DbError) -> Option<ErrorKind> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(f));
        self
    }

    pub fn kind_of(&self, err: &DbError) -> ErrorKind {
        self.custom
            .as_ref()
            .and_then(|f| f(err))
            .or_else(|| self.codes.get(&err.code()).copied())
            .unwrap_or(self.fallback)
    }

    pub fn translate(&self, operation: &str, key: &str, err: DbError) -> Error {
        Error::from_native(self.kind_of(&err), operation, key, err)
    }
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::h2()
    }
}

impl fmt::Debug for ErrorTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorTranslator")
            .field("codes", &self.codes)
            .field("custom", &self.custom.is_some())
            .field("fallback", &self.fallback)
            .finish()
    }
}
