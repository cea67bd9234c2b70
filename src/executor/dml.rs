use super::{ExecutionContext, Executor};
use crate::core::{DbError, Result, Row, Value};
use crate::result::QueryResult;
use crate::statement::Statement;
use crate::storage::TableSchema;
use crate::transaction::Change;

use async_trait::async_trait;

pub struct InsertExecutor;

#[async_trait]
impl Executor for InsertExecutor {
    fn name(&self) -> &'static str {
        "INSERT"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Insert { .. })
    }

    async fn execute(
        &self,
        stmt: &Statement,
        params: &[Value],
        ctx: &ExecutionContext<'_>,
    ) -> Result<QueryResult> {
        let Statement::Insert { table, columns } = stmt else {
            return Err(DbError::ExecutionError(format!("INSERT cannot run: {}", stmt)));
        };

        let schema = ctx.storage.get_schema(table)?;
        let row = self.build_row(&schema, columns, params)?;
        schema.validate_row(&row)?;

        let key = schema.key_of(&row);
        ctx.lock(table, &key).await?;

        if ctx.visible_row(table, &key)?.is_some() {
            return Err(DbError::DuplicateKey {
                table: table.clone(),
                key: row[schema.primary_key_index()].to_string(),
            });
        }

        ctx.record(Change::InsertRow {
            table: table.clone(),
            key,
            row,
        })?;

        Ok(QueryResult::affected(1))
    }
}

impl InsertExecutor {
    /// Place each parameter under its named column; unnamed columns get NULL.
    fn build_row(&self, schema: &TableSchema, columns: &[String], params: &[Value]) -> Result<Row> {
        let mut row: Row = vec![Value::Null; schema.columns().len()];
        let mut assigned = vec![false; row.len()];

        for (column, value) in columns.iter().zip(params) {
            let idx = schema.column_index(column)?;
            if assigned[idx] {
                return Err(DbError::ExecutionError(format!(
                    "Column '{}' specified more than once",
                    column
                )));
            }
            assigned[idx] = true;
            row[idx] = value.clone();
        }

        Ok(row)
    }
}
