use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result, Row, Value};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::storage::TableSchema;

use async_trait::async_trait;

pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Column indices to project; an empty list means every column.
    fn projection(&self, schema: &TableSchema, columns: &[String]) -> Result<(Vec<String>, Vec<usize>)> {
        if columns.is_empty() {
            let all = (0..schema.columns().len()).collect();
            return Ok((schema.column_names(), all));
        }

        let indices = columns
            .iter()
            .map(|name| schema.column_index(name))
            .collect::<Result<Vec<_>>>()?;
        Ok((columns.to_vec(), indices))
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for QueryExecutor {
    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        stmt.is_query()
    }

    /// Keyed reads lock the row like a write does, so a read-modify-write
    /// inside one transaction cannot lose a concurrent update. Full scans
    /// read committed state plus the transaction's own changes, unlocked.
    async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let Statement::Select {
            table,
            columns,
            by_key,
        } = stmt
        else {
            return Err(DbError::ExecutionError(format!("SELECT cannot run: {}", stmt)));
        };

        let schema = ctx.storage.get_schema(table)?;
        let (names, indices) = self.projection(&schema, columns)?;
        let project = |row: Row| -> Row { indices.iter().map(|&idx| row[idx].clone()).collect() };

        let rows: Vec<Row> = if *by_key {
            let key = schema.validate_key(&params[0])?;
            ctx.lock(table, &key).await?;
            ctx.visible_row(table, &key)?.into_iter().map(project).collect()
        } else {
            ctx.visible_rows(table)?
                .into_iter()
                .map(|(_, row)| project(row))
                .collect()
        };

        Ok(QueryResult::new(names, rows))
    }
}
