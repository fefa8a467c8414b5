use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single stored value, tagged by runtime type.
///
/// `Varchar` and `Text` attributes both carry `Value::Text`; they differ only
/// in which physical value table the row is routed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Decimal(f64),
    Text(String),
    Bool(bool),
    Datetime(DateTime<Utc>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int(_) => "INT",
            Self::Decimal(_) => "DECIMAL",
            Self::Text(_) => "TEXT",
            Self::Bool(_) => "BOOL",
            Self::Datetime(_) => "DATETIME",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Decimal(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Decimal(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Datetime(a), Self::Datetime(b)) => a == b,
            // Implicit coercion between Int and Decimal
            (Self::Int(i), Self::Decimal(f)) | (Self::Decimal(f), Self::Int(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{}", s),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Datetime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Self::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Decimal(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Datetime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Physical column type of a backing-store table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Decimal,
    Text,
    Boolean,
    Datetime,
}

impl ColumnType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Int(_)) => true,
            (Self::Decimal, Value::Decimal(_)) => true,
            (Self::Decimal, Value::Int(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Datetime, Value::Datetime(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Decimal => write!(f, "DECIMAL"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Datetime => write!(f, "DATETIME"),
        }
    }
}

/// Declared value type of an EAV attribute. Determines which physical value
/// table a dynamic attribute's rows land in; a pure dispatch tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Varchar,
    Int,
    Decimal,
    Datetime,
    Text,
}

impl ValueType {
    pub const ALL: [ValueType; 5] = [
        ValueType::Varchar,
        ValueType::Int,
        ValueType::Decimal,
        ValueType::Datetime,
        ValueType::Text,
    ];

    /// Suffix of the value table this type routes to, e.g. `products_varchar`.
    pub fn table_suffix(&self) -> &'static str {
        match self {
            Self::Varchar => "varchar",
            Self::Int => "int",
            Self::Decimal => "decimal",
            Self::Datetime => "datetime",
            Self::Text => "text",
        }
    }

    /// Physical type of the `value` column in the routed table.
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Varchar | Self::Text => ColumnType::Text,
            Self::Int => ColumnType::Integer,
            Self::Decimal => ColumnType::Decimal,
            Self::Datetime => ColumnType::Datetime,
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Varchar | Self::Text, Value::Text(_)) => true,
            (Self::Int, Value::Int(_) | Value::Bool(_)) => true,
            (Self::Decimal, Value::Decimal(_) | Value::Int(_)) => true,
            (Self::Datetime, Value::Datetime(_)) => true,
            _ => false,
        }
    }

    /// Coerce an accepted value into the representation its value table
    /// stores: booleans land in the int table, ints widen in the decimal one.
    pub fn normalize(&self, value: &Value) -> Value {
        match (self, value) {
            (Self::Int, Value::Bool(b)) => Value::Int(i64::from(*b)),
            (Self::Decimal, Value::Int(i)) => Value::Decimal(*i as f64),
            _ => value.clone(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "varchar" => Some(Self::Varchar),
            "int" => Some(Self::Int),
            "decimal" => Some(Self::Decimal),
            "datetime" => Some(Self::Datetime),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_suffix())
    }
}
