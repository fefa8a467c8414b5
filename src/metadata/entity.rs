use serde::{Deserialize, Serialize};

use crate::core::{EavError, Result, Row, Value, ValueType};

/// Metadata describing one kind of EAV-backed record: table names, default
/// attribute set, flat flag. Resolved from the `eav_entities` table and
/// cached process-wide by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub id: u64,
    pub entity_code: String,
    pub entity_name: String,
    pub entity_class: String,
    pub entity_table: String,
    pub default_attribute_set_id: u64,
    pub additional_attribute_table: Option<String>,
    pub relation_entity_ids: Vec<u64>,
    pub is_flat_enabled: bool,
    pub entity_desc: Option<String>,
}

impl EntityType {
    /// Name of the flat counterpart of the main table.
    pub fn flat_table(&self) -> String {
        format!("{}_flat", self.entity_table)
    }

    /// Name of the value table a given value type routes to.
    pub fn value_table(&self, value_type: ValueType) -> String {
        format!("{}_{}", self.entity_table, value_type.table_suffix())
    }

    pub(crate) fn from_row(id: u64, row: &Row) -> Result<Self> {
        let text = |column: &str| -> Result<String> {
            row.get(column)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| corrupt(column))
        };
        let opt_text = |column: &str| -> Option<String> {
            row.get(column).and_then(Value::as_str).map(str::to_string)
        };

        // The relation id list is stored as a JSON string column, NULL when
        // the entity type has no relations.
        let relation_entity_ids = match row.get("relation_entity_ids") {
            Some(Value::Text(json)) => serde_json::from_str(json)
                .map_err(|_| corrupt("relation_entity_ids"))?,
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            entity_code: text("entity_code")?,
            entity_name: text("entity_name")?,
            entity_class: text("entity_class")?,
            entity_table: text("entity_table")?,
            default_attribute_set_id: row
                .get("default_attribute_set_id")
                .and_then(Value::as_i64)
                .map(|v| v as u64)
                .ok_or_else(|| corrupt("default_attribute_set_id"))?,
            additional_attribute_table: opt_text("additional_attribute_table"),
            relation_entity_ids,
            is_flat_enabled: row
                .get("is_flat_enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            entity_desc: opt_text("entity_desc"),
        })
    }

    pub(crate) fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("entity_code".into(), self.entity_code.as_str().into());
        row.insert("entity_name".into(), self.entity_name.as_str().into());
        row.insert("entity_class".into(), self.entity_class.as_str().into());
        row.insert("entity_table".into(), self.entity_table.as_str().into());
        row.insert(
            "default_attribute_set_id".into(),
            Value::Int(self.default_attribute_set_id as i64),
        );
        row.insert(
            "additional_attribute_table".into(),
            self.additional_attribute_table.clone().into(),
        );
        row.insert(
            "relation_entity_ids".into(),
            if self.relation_entity_ids.is_empty() {
                Value::Null
            } else {
                // Serialization of Vec<u64> cannot fail.
                Value::Text(serde_json::to_string(&self.relation_entity_ids).unwrap())
            },
        );
        row.insert("is_flat_enabled".into(), Value::Bool(self.is_flat_enabled));
        row.insert("entity_desc".into(), self.entity_desc.clone().into());
        row
    }
}

/// A named grouping of attributes applicable to a subset of records of one
/// entity type. Every entity type has exactly one default set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub id: u64,
    pub entity_id: u64,
    pub set_name: String,
}

impl AttributeSet {
    pub(crate) fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("entity_id".into(), Value::Int(self.entity_id as i64));
        row.insert("set_name".into(), self.set_name.as_str().into());
        row
    }
}

fn corrupt(column: &str) -> EavError {
    EavError::Storage(format!("Corrupt entity metadata: bad column '{}'", column))
}
