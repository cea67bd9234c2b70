use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::transaction::Change;

use async_trait::async_trait;

pub struct UpdateExecutor;

impl UpdateExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UpdateExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for UpdateExecutor {
    fn name(&self) -> &'static str {
        "UPDATE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Update { .. })
    }

    /// Update the row with the given key.
    ///
    /// A missing row is not an error: zero rows are affected.
    async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let Statement::Update { table, assignments } = stmt else {
            return Err(DbError::ExecutionError(format!("UPDATE cannot run: {}", stmt)));
        };

        let schema = ctx.storage.get_schema(table)?;
        let (values, key_param) = params.split_at(assignments.len());
        let key = schema.validate_key(&key_param[0])?;

        let mut targets = Vec::with_capacity(assignments.len());
        for column in assignments {
            let idx = schema.column_index(column)?;
            if idx == schema.primary_key_index() {
                return Err(DbError::ExecutionError(format!(
                    "Primary key column '{}' cannot be updated",
                    column
                )));
            }
            targets.push(idx);
        }

        ctx.lock(table, &key).await?;

        let Some(old_row) = ctx.visible_row(table, &key)? else {
            return Ok(QueryResult::affected(0));
        };

        let mut new_row = old_row.clone();
        for (idx, value) in targets.into_iter().zip(values) {
            new_row[idx] = value.clone();
        }
        schema.validate_row(&new_row)?;

        ctx.record(Change::UpdateRow {
            table: table.clone(),
            key,
            old_row,
            new_row,
        })?;

        Ok(QueryResult::affected(1))
    }
}
