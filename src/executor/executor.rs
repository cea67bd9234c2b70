use super::ExecutionContext;
use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use crate::statement::Statement;

use async_trait::async_trait;

#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, stmt: &Statement) -> bool;

    async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult>;
}

pub struct ExecutorPipeline {
    pub executors: Vec<Box<dyn Executor>>,
}

impl ExecutorPipeline {
    pub fn new() -> Self {
        Self {
            executors: Vec::new(),
        }
    }

    pub fn register(&mut self, executor: Box<dyn Executor>) {
        self.executors.push(executor);
    }

    /// Bind-check `params` and dispatch to the first executor that accepts
    /// the statement.
    pub async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        check_parameter_count(stmt, params)?;

        for executor in &self.executors {
            if executor.can_handle(stmt) {
                log::trace!("{} executing on {}: {}", executor.name(), ctx.txn_id, stmt);
                return executor.execute(stmt, params, ctx).await;
            }
        }

        Err(DbError::ExecutionError(format!(
            "No executor found for statement: {}",
            stmt
        )))
    }
}

impl Default for ExecutorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

pub fn check_parameter_count(stmt: &Statement, params: &[Value]) -> Result<()> {
    let expected = stmt.parameter_count();
    if params.len() != expected {
        return Err(DbError::ParameterCount {
            expected,
            actual: params.len(),
        });
    }
    Ok(())
}
