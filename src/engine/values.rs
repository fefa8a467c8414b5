use std::sync::Arc;

use tracing::debug;

use crate::core::{EavError, Result, Row, Value};
use crate::metadata::{AttributeDescriptor, EntityType};
use crate::storage::{Filter, MemoryBackend};
use crate::transaction::Transaction;

/// Writes individual attribute values into their type-routed value tables.
///
/// Routing is a pure dispatch on the descriptor's declared value type; every
/// row is `(entity_id, attribute_id, value)` and NULL is never stored — the
/// EAV tables only hold present values.
pub struct AttributeValueStore {
    backend: Arc<MemoryBackend>,
}

impl AttributeValueStore {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self { backend }
    }

    /// Insert one value row. A NULL value writes nothing; a second row for
    /// the same (entity, attribute) pair is a constraint violation.
    pub async fn insert_attribute(
        &self,
        txn: &mut Transaction,
        entity: &EntityType,
        attribute: &AttributeDescriptor,
        value: &Value,
        entity_id: u64,
    ) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let table = entity.value_table(attribute.value_type);
        let value = self.checked(attribute, value)?;

        if self.find(&table, attribute.id, entity_id).await?.is_some() {
            return Err(EavError::ConstraintViolation(format!(
                "Attribute '{}' already has a value row for entity {}",
                attribute.attribute_code, entity_id
            )));
        }

        debug!(table = %table, code = %attribute.attribute_code, entity_id, "insert attribute");
        self.backend
            .insert(txn, &table, value_row(attribute.id, entity_id, value))
            .await?;
        Ok(())
    }

    /// Upsert one value row: update in place when present, insert when not.
    /// A NULL value deletes the existing row instead.
    pub async fn update_attribute(
        &self,
        txn: &mut Transaction,
        entity: &EntityType,
        attribute: &AttributeDescriptor,
        value: &Value,
        entity_id: u64,
    ) -> Result<()> {
        let table = entity.value_table(attribute.value_type);
        let existing = self.find(&table, attribute.id, entity_id).await?;

        if value.is_null() {
            if let Some(row_id) = existing {
                debug!(table = %table, code = %attribute.attribute_code, entity_id, "delete attribute");
                self.backend.delete(txn, &table, row_id).await?;
            }
            return Ok(());
        }

        let value = self.checked(attribute, value)?;
        match existing {
            Some(row_id) => {
                debug!(table = %table, code = %attribute.attribute_code, entity_id, "update attribute");
                let mut changes = Row::new();
                changes.insert("value".into(), value);
                self.backend.update(txn, &table, row_id, &changes).await
            }
            None => {
                debug!(table = %table, code = %attribute.attribute_code, entity_id, "insert attribute");
                self.backend
                    .insert(txn, &table, value_row(attribute.id, entity_id, value))
                    .await?;
                Ok(())
            }
        }
    }

    async fn find(&self, table: &str, attribute_id: u64, entity_id: u64) -> Result<Option<u64>> {
        let rows = self
            .backend
            .select(
                table,
                &Filter::and(vec![
                    Filter::eq("entity_id", entity_id as i64),
                    Filter::eq("attribute_id", attribute_id as i64),
                ]),
            )
            .await?;
        Ok(rows.into_iter().next().map(|(row_id, _)| row_id))
    }

    fn checked(&self, attribute: &AttributeDescriptor, value: &Value) -> Result<Value> {
        if !attribute.value_type.accepts(value) {
            return Err(EavError::TypeMismatch(format!(
                "Attribute '{}' of type {} cannot store {}",
                attribute.attribute_code,
                attribute.value_type,
                value.type_name()
            )));
        }
        Ok(attribute.value_type.normalize(value))
    }
}

fn value_row(attribute_id: u64, entity_id: u64, value: Value) -> Row {
    let mut row = Row::new();
    row.insert("entity_id".into(), Value::Int(entity_id as i64));
    row.insert("attribute_id".into(), Value::Int(attribute_id as i64));
    row.insert("value".into(), value);
    row
}
