use super::{Table, TableSchema};
use crate::core::{DbError, Result, Row};
use crate::transaction::Change;
use std::collections::HashMap;
use std::sync::RwLock;

/// Committed state of every table.
///
/// Guarded by a std lock that is never held across an await point, so commit
/// and rollback stay synchronous.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write()?;
        let name = schema.name().to_string();

        if tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(name))
            .unwrap_or(false)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_schema(&self, table_name: &str) -> Result<TableSchema> {
        let tables = self.tables.read()?;
        tables
            .get(table_name)
            .map(|table| table.schema().clone())
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))
    }

    pub fn get_row(&self, table_name: &str, key: &str) -> Result<Option<Row>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))?;
        Ok(table.get(key).cloned())
    }

    /// All committed rows of a table, ordered by key.
    pub fn scan_table(&self, table_name: &str) -> Result<Vec<(String, Row)>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))?;
        Ok(table
            .scan()
            .map(|(key, row)| (key.clone(), row.clone()))
            .collect())
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        tables
            .get(table_name)
            .map(Table::row_count)
            .ok_or_else(|| DbError::TableNotFound(table_name.to_string()))
    }

    /// Apply a transaction's change log as one unit.
    ///
    /// Either every change lands or, on the first failure, the ones already
    /// applied are undone in reverse order and the error is returned.
    pub fn apply_changes(&self, changes: &[Change]) -> Result<()> {
        let mut tables = self.tables.write()?;

        for (applied, change) in changes.iter().enumerate() {
            if let Err(err) = apply_one(&mut tables, change) {
                for done in changes[..applied].iter().rev() {
                    undo_one(&mut tables, done);
                }
                return Err(err);
            }
        }

        Ok(())
    }
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, name: &str) -> Result<&'a mut Table> {
    tables
        .get_mut(name)
        .ok_or_else(|| DbError::TableNotFound(name.to_string()))
}

fn apply_one(tables: &mut HashMap<String, Table>, change: &Change) -> Result<()> {
    match change {
        Change::InsertRow { table, key, row } => table_mut(tables, table)?.insert(key.clone(), row.clone()),
        Change::UpdateRow {
            table, key, new_row, ..
        } => match table_mut(tables, table)?.replace(key, new_row.clone()) {
            Some(_) => Ok(()),
            None => Err(DbError::ExecutionError(format!(
                "Row {} vanished from table '{}' before commit",
                key, table
            ))),
        },
        Change::DeleteRow { table, key, .. } => match table_mut(tables, table)?.remove(key) {
            Some(_) => Ok(()),
            None => Err(DbError::ExecutionError(format!(
                "Row {} vanished from table '{}' before commit",
                key, table
            ))),
        },
    }
}

fn undo_one(tables: &mut HashMap<String, Table>, change: &Change) {
    let Some(target) = tables.get_mut(change.table_name()) else {
        return;
    };
    match change {
        Change::InsertRow { key, .. } => {
            target.remove(key);
        }
        Change::UpdateRow { key, old_row, .. } => {
            target.replace(key, old_row.clone());
        }
        Change::DeleteRow { key, old_row, .. } => {
            let _ = target.insert(key.clone(), old_row.clone());
        }
    }
}
