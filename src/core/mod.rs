pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result, codes};
pub use types::{Column, DataType, Row};
pub use value::Value;
