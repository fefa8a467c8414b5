// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Command Pattern over reversible write operations. Each Change records the
// information needed to undo one write; rollback replays the journal in
// reverse order.
//
// ============================================================================

use crate::core::Row;

/// One reversible write inside a transaction.
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted; undo removes it.
    InsertRow { table: String, row_id: u64 },

    /// A row was updated; undo reinstates the previous full row.
    UpdateRow {
        table: String,
        row_id: u64,
        old_row: Row,
    },

    /// A row was deleted; undo reinserts it under its original id.
    DeleteRow {
        table: String,
        row_id: u64,
        old_row: Row,
    },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_table_name() {
        let change = Change::InsertRow {
            table: "products".to_string(),
            row_id: 1,
        };
        assert_eq!(change.table_name(), "products");
    }
}
