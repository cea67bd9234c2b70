//! Typed, parameterized statements.
//!
//! A statement names its table and columns; every value travels separately as
//! a positional parameter, so caller data is never spliced into the statement.
//! Statements address rows by primary key only, which is all the repository
//! layer needs.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `insert into t(c1, c2) values(?, ?)`
    Insert { table: String, columns: Vec<String> },

    /// `select c1, c2 from t [where pk = ?]`; an empty column list selects all.
    Select {
        table: String,
        columns: Vec<String>,
        by_key: bool,
    },

    /// `update t set c1=?, c2=? where pk = ?`; the key is the last parameter.
    Update { table: String, assignments: Vec<String> },

    /// `delete from t where pk = ?`
    Delete { table: String },
}

impl Statement {
    pub fn insert(table: &str, columns: &[&str]) -> Self {
        Statement::Insert {
            table: table.to_string(),
            columns: owned_names(columns),
        }
    }

    pub fn select_by_key(table: &str, columns: &[&str]) -> Self {
        Statement::Select {
            table: table.to_string(),
            columns: owned_names(columns),
            by_key: true,
        }
    }

    pub fn select_all(table: &str, columns: &[&str]) -> Self {
        Statement::Select {
            table: table.to_string(),
            columns: owned_names(columns),
            by_key: false,
        }
    }

    pub fn update_by_key(table: &str, assignments: &[&str]) -> Self {
        Statement::Update {
            table: table.to_string(),
            assignments: owned_names(assignments),
        }
    }

    pub fn delete_by_key(table: &str) -> Self {
        Statement::Delete {
            table: table.to_string(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. }
            | Statement::Select { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table } => table,
        }
    }

    /// Number of `?` placeholders the statement binds.
    pub fn parameter_count(&self) -> usize {
        match self {
            Statement::Insert { columns, .. } => columns.len(),
            Statement::Select { by_key, .. } => usize::from(*by_key),
            Statement::Update { assignments, .. } => assignments.len() + 1,
            Statement::Delete { .. } => 1,
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Statement::Select { .. })
    }
}

fn owned_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// SQL-like rendering with placeholders, for logs.
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert { table, columns } => {
                let marks = vec!["?"; columns.len()].join(", ");
                write!(f, "insert into {}({}) values({})", table, columns.join(", "), marks)
            }
            Statement::Select {
                table,
                columns,
                by_key,
            } => {
                let projection = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns.join(", ")
                };
                write!(f, "select {} from {}", projection, table)?;
                if *by_key {
                    write!(f, " where <pk> = ?")?;
                }
                Ok(())
            }
            Statement::Update { table, assignments } => {
                let sets: Vec<String> = assignments.iter().map(|col| format!("{}=?", col)).collect();
                write!(f, "update {} set {} where <pk> = ?", table, sets.join(", "))
            }
            Statement::Delete { table } => write!(f, "delete from {} where <pk> = ?", table),
        }
    }
}
