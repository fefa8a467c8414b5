use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Column, EavError, Result, Row, Schema, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// One physical table: schema plus rows keyed by a generated id.
///
/// Row ids start at 1 and are handed back from `insert`; the persistence
/// engine uses the main-table id as the entity id shared by all of the
/// record's attribute-value rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<u64, Row>,
    next_row_id: u64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn insert(&mut self, row: Row) -> Result<u64> {
        self.schema.schema().validate_row(self.schema.name(), &row)?;
        self.check_uniqueness(&row, None)?;

        let id = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Merge changed columns into an existing row, returning the previous
    /// full row for the transaction journal.
    pub fn update(&mut self, id: u64, changes: &Row) -> Result<Row> {
        self.schema
            .schema()
            .validate_changes(self.schema.name(), changes)?;

        let current = self
            .rows
            .get(&id)
            .ok_or_else(|| EavError::Storage(format!(
                "Row {} not found in table '{}'",
                id,
                self.schema.name()
            )))?
            .clone();

        let mut merged = current.clone();
        for (name, value) in changes {
            merged.insert(name.clone(), value.clone());
        }
        self.check_uniqueness(&merged, Some(id))?;

        self.rows.insert(id, merged);
        Ok(current)
    }

    /// Remove a row, returning it for the transaction journal.
    pub fn delete(&mut self, id: u64) -> Result<Row> {
        self.rows.remove(&id).ok_or_else(|| {
            EavError::Storage(format!(
                "Row {} not found in table '{}'",
                id,
                self.schema.name()
            ))
        })
    }

    pub fn get(&self, id: u64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn rows(&self) -> impl Iterator<Item = (u64, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    // Rollback paths: reinstate prior state without re-validation; the
    // journaled rows were valid when recorded.

    pub(crate) fn rollback_insert(&mut self, id: u64) {
        self.rows.remove(&id);
    }

    pub(crate) fn rollback_update(&mut self, id: u64, old_row: Row) {
        self.rows.insert(id, old_row);
    }

    pub(crate) fn rollback_delete(&mut self, id: u64, old_row: Row) {
        self.rows.insert(id, old_row);
        if id >= self.next_row_id {
            self.next_row_id = id + 1;
        }
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<u64>) -> Result<()> {
        for column in self.schema.schema().columns() {
            if !column.unique {
                continue;
            }
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            for (id, existing) in &self.rows {
                if ignore_id == Some(*id) {
                    continue;
                }
                if existing.get(&column.name) == Some(value) {
                    return Err(EavError::ConstraintViolation(format!(
                        "Unique constraint violation: column '{}' of table '{}' already contains {}",
                        column.name,
                        self.schema.name(),
                        value
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnType;

    fn table() -> Table {
        Table::new(TableSchema::new(
            "users",
            vec![
                Column::new("name", ColumnType::Text).not_null(),
                Column::new("email", ColumnType::Text).unique(),
            ],
        ))
    }

    fn row(name: &str, email: &str) -> Row {
        let mut r = Row::new();
        r.insert("name".into(), Value::Text(name.into()));
        r.insert("email".into(), Value::Text(email.into()));
        r
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut t = table();
        assert_eq!(t.insert(row("a", "a@x")).unwrap(), 1);
        assert_eq!(t.insert(row("b", "b@x")).unwrap(), 2);
    }

    #[test]
    fn test_unique_constraint() {
        let mut t = table();
        t.insert(row("a", "a@x")).unwrap();
        let err = t.insert(row("b", "a@x")).unwrap_err();
        assert!(matches!(err, EavError::ConstraintViolation(_)));
    }

    #[test]
    fn test_update_merges_and_returns_old_row() {
        let mut t = table();
        let id = t.insert(row("a", "a@x")).unwrap();

        let mut changes = Row::new();
        changes.insert("name".into(), Value::Text("b".into()));
        let old = t.update(id, &changes).unwrap();

        assert_eq!(old.get("name"), Some(&Value::Text("a".into())));
        let current = t.get(id).unwrap();
        assert_eq!(current.get("name"), Some(&Value::Text("b".into())));
        assert_eq!(current.get("email"), Some(&Value::Text("a@x".into())));
    }

    #[test]
    fn test_rollback_delete_restores_row_id() {
        let mut t = table();
        let id = t.insert(row("a", "a@x")).unwrap();
        let old = t.delete(id).unwrap();
        t.rollback_delete(id, old);
        assert!(t.get(id).is_some());
        // fresh inserts must not collide with the restored id
        assert_ne!(t.insert(row("b", "b@x")).unwrap(), id);
    }
}
