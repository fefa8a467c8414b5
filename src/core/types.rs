use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ColumnType, EavError, Result, Value};

/// A stored row, keyed by column name. Absent columns read as NULL.
pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            unique: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(EavError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.column_type.is_compatible(value) {
            return Err(EavError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.column_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Validate a full row: every value must belong to a declared column and
    /// satisfy its type and NOT NULL constraints. Absent columns are NULL.
    pub fn validate_row(&self, table: &str, row: &Row) -> Result<()> {
        for name in row.keys() {
            if !self.has_column(name) {
                return Err(EavError::ColumnNotFound(name.clone(), table.to_string()));
            }
        }
        for column in &self.columns {
            let value = row.get(&column.name).unwrap_or(&Value::Null);
            column.validate(value)?;
        }
        Ok(())
    }

    /// Validate a partial update: only the touched columns are checked.
    pub fn validate_changes(&self, table: &str, changes: &Row) -> Result<()> {
        for (name, value) in changes {
            let column = self
                .column(name)
                .ok_or_else(|| EavError::ColumnNotFound(name.clone(), table.to_string()))?;
            column.validate(value)?;
        }
        Ok(())
    }
}
