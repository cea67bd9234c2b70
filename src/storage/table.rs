use crate::core::{Column, DbError, Result, Row, Value};
use std::collections::BTreeMap;

/// Table definition: ordered columns plus the primary-key column.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    primary_key: usize,
}

impl TableSchema {
    /// Build a schema keyed by `primary_key`.
    ///
    /// The key column is forced to NOT NULL.
    pub fn new(name: impl Into<String>, columns: Vec<Column>, primary_key: &str) -> Result<Self> {
        let name = name.into();
        let primary_key = columns
            .iter()
            .position(|col| col.name == primary_key)
            .ok_or_else(|| DbError::ColumnNotFound(primary_key.to_string(), name.clone()))?;

        let mut columns = columns;
        columns[primary_key].nullable = false;

        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    pub fn primary_key_column(&self) -> &Column {
        &self.columns[self.primary_key]
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.find_column_index(name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), self.name.clone()))
    }

    /// Row key derived from the primary-key cell.
    pub fn key_of(&self, row: &Row) -> String {
        row[self.primary_key].key_string()
    }

    pub fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::ExecutionError(format!(
                "Table '{}' has {} columns, row has {}",
                self.name,
                self.columns.len(),
                row.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }

    /// Validate a key parameter against the primary-key column type.
    pub fn validate_key(&self, key: &Value) -> Result<String> {
        self.primary_key_column().validate(key)?;
        Ok(key.key_string())
    }
}

/// Committed rows of one table, ordered by key.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<String, Row>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    pub fn insert(&mut self, key: String, row: Row) -> Result<()> {
        if self.rows.contains_key(&key) {
            return Err(DbError::DuplicateKey {
                table: self.schema.name().to_string(),
                key: row[self.schema.primary_key_index()].to_string(),
            });
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Replace an existing row, returning the previous one.
    pub fn replace(&mut self, key: &str, row: Row) -> Option<Row> {
        self.rows.get_mut(key).map(|slot| std::mem::replace(slot, row))
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        self.rows.remove(key)
    }

    pub fn scan(&self) -> impl Iterator<Item = (&String, &Row)> {
        self.rows.iter()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
