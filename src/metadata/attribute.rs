use crate::core::{EavError, Result, Row, Value, ValueType};
use crate::validation::{parse_rules, Rule};

/// Metadata for one declared attribute of an entity type.
///
/// Immutable once resolved: the loader hands out `Arc`s of these for the
/// lifetime of its cache. A static descriptor is physically a main-table
/// column and never routes through the value store.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    pub id: u64,
    pub entity_id: u64,
    pub attribute_code: String,
    pub value_type: ValueType,
    pub is_static: bool,
    pub attribute_set_id: Option<u64>,
    pub frontend_label: Option<String>,
    pub validation_rules: Option<String>,
    rules: Vec<Rule>,
}

impl AttributeDescriptor {
    /// Parsed form of `validation_rules`; parsed once at resolution.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Whether this attribute applies to a record in the given attribute
    /// set. A descriptor without set membership applies to every set.
    pub fn applies_to_set(&self, set_id: Option<u64>) -> bool {
        match (self.attribute_set_id, set_id) {
            (Some(own), Some(record)) => own == record,
            _ => true,
        }
    }

    pub(crate) fn from_row(id: u64, row: &Row) -> Result<Self> {
        let attribute_code = row
            .get("attribute_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| corrupt("attribute_code"))?;

        let value_type = row
            .get("value_type")
            .and_then(Value::as_str)
            .and_then(ValueType::parse)
            .ok_or_else(|| corrupt("value_type"))?;

        let validation_rules = row
            .get("validation_rules")
            .and_then(Value::as_str)
            .map(str::to_string);
        let rules = match &validation_rules {
            Some(expr) => parse_rules(expr)?,
            None => Vec::new(),
        };

        Ok(Self {
            id,
            entity_id: row
                .get("entity_id")
                .and_then(Value::as_i64)
                .map(|v| v as u64)
                .ok_or_else(|| corrupt("entity_id"))?,
            attribute_code,
            value_type,
            is_static: row
                .get("is_static")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            attribute_set_id: row
                .get("attribute_set_id")
                .and_then(Value::as_i64)
                .map(|v| v as u64),
            frontend_label: row
                .get("frontend_label")
                .and_then(Value::as_str)
                .map(str::to_string),
            validation_rules,
            rules,
        })
    }
}

fn corrupt(column: &str) -> EavError {
    EavError::Storage(format!(
        "Corrupt attribute metadata: bad column '{}'",
        column
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_row(code: &str, set_id: Option<u64>) -> Row {
        let mut row = Row::new();
        row.insert("entity_id".into(), Value::Int(1));
        row.insert("attribute_code".into(), code.into());
        row.insert("value_type".into(), "varchar".into());
        row.insert("is_static".into(), Value::Bool(false));
        row.insert("validation_rules".into(), "required|max:10".into());
        row.insert("attribute_set_id".into(), set_id.into());
        row
    }

    #[test]
    fn test_from_row_parses_rules_once() {
        let desc = AttributeDescriptor::from_row(5, &descriptor_row("color", None)).unwrap();
        assert_eq!(desc.id, 5);
        assert_eq!(desc.value_type, ValueType::Varchar);
        assert_eq!(desc.rules().len(), 2);
    }

    #[test]
    fn test_set_membership() {
        let unset = AttributeDescriptor::from_row(1, &descriptor_row("a", None)).unwrap();
        let in_set = AttributeDescriptor::from_row(2, &descriptor_row("b", Some(7))).unwrap();

        assert!(unset.applies_to_set(Some(7)));
        assert!(unset.applies_to_set(None));
        assert!(in_set.applies_to_set(Some(7)));
        assert!(in_set.applies_to_set(None));
        assert!(!in_set.applies_to_set(Some(8)));
    }

    #[test]
    fn test_bad_value_type_is_storage_error() {
        let mut row = descriptor_row("color", None);
        row.insert("value_type".into(), "blob".into());
        assert!(matches!(
            AttributeDescriptor::from_row(1, &row),
            Err(EavError::Storage(_))
        ));
    }
}
