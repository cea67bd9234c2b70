use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::transaction::Change;

use async_trait::async_trait;

pub struct DeleteExecutor;

impl DeleteExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DeleteExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for DeleteExecutor {
    fn name(&self) -> &'static str {
        "DELETE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Delete { .. })
    }

    async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let Statement::Delete { table } = stmt else {
            return Err(DbError::ExecutionError(format!("DELETE cannot run: {}", stmt)));
        };

        let schema = ctx.storage.get_schema(table)?;
        let key = schema.validate_key(&params[0])?;

        ctx.lock(table, &key).await?;

        let Some(old_row) = ctx.visible_row(table, &key)? else {
            return Ok(QueryResult::affected(0));
        };

        ctx.record(Change::DeleteRow {
            table: table.clone(),
            key,
            old_row,
        })?;

        Ok(QueryResult::affected(1))
    }
}
