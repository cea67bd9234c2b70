pub mod context;
pub mod executor;
pub mod delete;
pub mod dml;
pub mod query;
pub mod update;

pub use context::ExecutionContext;
pub use executor::{Executor, ExecutorPipeline};
