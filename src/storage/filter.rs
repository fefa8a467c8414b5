use crate::core::{Row, Value};

/// Row predicate for metadata lookups. The persistence core only ever needs
/// equality and set-membership matching (`WHERE code = ?`, `WHERE id IN`),
/// so that is all this models.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn in_list<V: Into<Value>>(column: impl Into<String>, values: Vec<V>) -> Self {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Self::And(filters)
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::All => true,
            Self::Eq(column, value) => row.get(column).unwrap_or(&Value::Null) == value,
            Self::In(column, values) => {
                let cell = row.get(column).unwrap_or(&Value::Null);
                values.iter().any(|v| v == cell)
            }
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
        }
    }
}
