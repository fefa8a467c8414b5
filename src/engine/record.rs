use std::collections::BTreeMap;

use crate::core::{Row, Value};

/// Main-table columns managed by the engine rather than declared as
/// attributes: identity, set membership and timestamps.
pub const RESERVED_CODES: [&str; 4] = [
    "entity_type_id",
    "attribute_set_id",
    "created_at",
    "updated_at",
];

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.contains(&code)
}

/// One instance of an entity type: an open attribute map plus the snapshot
/// of its last persisted state, which drives dirty-field diffing on update.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    entity_code: String,
    id: Option<u64>,
    attributes: Row,
    persisted: Row,
    exists: bool,
}

impl EntityRecord {
    pub fn new(entity_code: impl Into<String>) -> Self {
        Self {
            entity_code: entity_code.into(),
            id: None,
            attributes: Row::new(),
            persisted: Row::new(),
            exists: false,
        }
    }

    pub fn entity_code(&self) -> &str {
        &self.entity_code
    }

    /// Primary key, assigned by the main-table insert; the foreign key of
    /// every attribute-value row of this record.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Whether the record has been persisted (routes save to update).
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn get(&self, code: &str) -> Option<&Value> {
        self.attributes.get(code)
    }

    pub fn set(&mut self, code: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(code.into(), value.into());
        self
    }

    pub fn unset(&mut self, code: &str) -> &mut Self {
        self.attributes.remove(code);
        self
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    pub fn attribute_set_id(&self) -> Option<u64> {
        self.attributes
            .get("attribute_set_id")
            .and_then(Value::as_i64)
            .map(|v| v as u64)
    }

    pub fn entity_type_id(&self) -> Option<u64> {
        self.attributes
            .get("entity_type_id")
            .and_then(Value::as_i64)
            .map(|v| v as u64)
    }

    /// Fields changed since the last persisted state: new codes, and codes
    /// whose value differs from the snapshot.
    pub fn dirty(&self) -> Row {
        let mut dirty = BTreeMap::new();
        for (code, value) in &self.attributes {
            if self.persisted.get(code) != Some(value) {
                dirty.insert(code.clone(), value.clone());
            }
        }
        dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.attributes
            .iter()
            .any(|(code, value)| self.persisted.get(code) != Some(value))
    }

    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    pub(crate) fn mark_exists(&mut self) {
        self.exists = true;
    }

    /// Reset the dirty baseline to the current attribute state; called after
    /// a committed save, and by the facade when hydrating a loaded record.
    pub(crate) fn sync_persisted(&mut self) {
        self.persisted = self.attributes.clone();
        self.exists = true;
    }

    /// Undo the in-memory identity assignment after a rolled-back insert, so
    /// a later save retries the insert path.
    pub(crate) fn reset_identity(&mut self, id: Option<u64>, exists: bool) {
        self.id = id;
        self.exists = exists;
    }
}
