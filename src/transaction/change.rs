// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Each Change is one buffered row write. The log is replayed against the
// committed tables on COMMIT and simply discarded on ROLLBACK; old rows are
// kept so a half-applied commit can be undone.
//
// ============================================================================

use crate::core::Row;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert a new row into a table
    InsertRow { table: String, key: String, row: Row },

    /// Replace an existing row
    UpdateRow {
        table: String,
        key: String,
        old_row: Row,
        new_row: Row,
    },

    /// Delete an existing row
    DeleteRow {
        table: String,
        key: String,
        old_row: Row,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Change::InsertRow { key, .. } => key,
            Change::UpdateRow { key, .. } => key,
            Change::DeleteRow { key, .. } => key,
        }
    }

    /// Row visible after this change, `None` for a delete.
    pub fn after_image(&self) -> Option<&Row> {
        match self {
            Change::InsertRow { row, .. } => Some(row),
            Change::UpdateRow { new_row, .. } => Some(new_row),
            Change::DeleteRow { .. } => None,
        }
    }
}
