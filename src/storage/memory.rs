use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{Filter, Table, TableSchema};
use crate::core::{EavError, Result, Row};
use crate::transaction::{Change, Transaction};

/// The relational backing store: named tables with typed columns, generated
/// row ids, filtered scans and journal-backed transactions.
///
/// Writes go through an open [`Transaction`]; the transaction owns the
/// writer gate, so one save operation mutates storage at a time. Reads are
/// lock-per-call and see the latest state, which is sound under the
/// single-writer model.
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
    writer_gate: Arc<Mutex<()>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            writer_gate: Arc::new(Mutex::new(())),
        }
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write().await;
        let name = schema.name().to_string();
        if tables.contains_key(&name) {
            return Err(EavError::TableExists(name));
        }
        debug!(table = %name, "create table");
        tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub async fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.remove(name).is_none() {
            return Err(EavError::TableNotFound(name.to_string()));
        }
        Ok(())
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    pub async fn table_schema(&self, name: &str) -> Result<TableSchema> {
        let tables = self.tables.read().await;
        let table = tables
            .get(name)
            .ok_or_else(|| EavError::TableNotFound(name.to_string()))?;
        Ok(table.schema().clone())
    }

    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self.table_schema(table).await?.schema().has_column(column))
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a transaction. Blocks until the writer gate is free.
    pub async fn begin(&self) -> Transaction {
        let gate = Arc::clone(&self.writer_gate).lock_owned().await;
        let txn = Transaction::new(gate);
        debug!(txn = %txn.id(), "begin");
        txn
    }

    /// Commit: the journal is simply discarded, writes are already in place.
    pub async fn commit(&self, mut txn: Transaction) -> Result<()> {
        let changes = txn.take_changes();
        debug!(txn = %txn.id(), writes = changes.len(), "commit");
        Ok(())
    }

    /// Roll back every write of the transaction, newest first.
    pub async fn rollback(&self, mut txn: Transaction) -> Result<()> {
        let changes = txn.take_changes();
        debug!(txn = %txn.id(), writes = changes.len(), "rollback");

        let mut tables = self.tables.write().await;
        for change in changes.into_iter().rev() {
            let table = tables.get_mut(change.table_name()).ok_or_else(|| {
                EavError::Storage(format!(
                    "Rollback references missing table '{}'",
                    change.table_name()
                ))
            })?;
            match change {
                Change::InsertRow { row_id, .. } => table.rollback_insert(row_id),
                Change::UpdateRow { row_id, old_row, .. } => {
                    table.rollback_update(row_id, old_row)
                }
                Change::DeleteRow { row_id, old_row, .. } => {
                    table.rollback_delete(row_id, old_row)
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes (journaled)
    // ------------------------------------------------------------------

    /// Insert a row, returning the generated id.
    pub async fn insert(
        &self,
        txn: &mut Transaction,
        table_name: &str,
        row: Row,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        let row_id = table.insert(row)?;
        txn.record(Change::InsertRow {
            table: table_name.to_string(),
            row_id,
        });
        Ok(row_id)
    }

    /// Merge changed columns into the row keyed by `row_id`.
    pub async fn update(
        &self,
        txn: &mut Transaction,
        table_name: &str,
        row_id: u64,
        changes: &Row,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        let old_row = table.update(row_id, changes)?;
        txn.record(Change::UpdateRow {
            table: table_name.to_string(),
            row_id,
            old_row,
        });
        Ok(())
    }

    pub async fn delete(
        &self,
        txn: &mut Transaction,
        table_name: &str,
        row_id: u64,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        let old_row = table.delete(row_id)?;
        txn.record(Change::DeleteRow {
            table: table_name.to_string(),
            row_id,
            old_row,
        });
        Ok(())
    }

    // Single-statement conveniences for metadata writes outside a save
    // operation (entity/attribute registration).

    pub async fn insert_autocommit(&self, table_name: &str, row: Row) -> Result<u64> {
        let mut txn = self.begin().await;
        let id = self.insert(&mut txn, table_name, row).await?;
        self.commit(txn).await?;
        Ok(id)
    }

    pub async fn update_autocommit(
        &self,
        table_name: &str,
        row_id: u64,
        changes: &Row,
    ) -> Result<()> {
        let mut txn = self.begin().await;
        self.update(&mut txn, table_name, row_id, changes).await?;
        self.commit(txn).await
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get(&self, table_name: &str, row_id: u64) -> Result<Option<Row>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        Ok(table.get(row_id).cloned())
    }

    pub async fn select(&self, table_name: &str, filter: &Filter) -> Result<Vec<(u64, Row)>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        Ok(table
            .rows()
            .filter(|(_, row)| filter.matches(row))
            .map(|(id, row)| (id, row.clone()))
            .collect())
    }

    pub async fn row_count(&self, table_name: &str) -> Result<usize> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| EavError::TableNotFound(table_name.to_string()))?;
        Ok(table.row_count())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
