pub mod error;
pub mod types;
pub mod value;

pub use error::{EavError, Result};
pub use types::{Column, Row, Schema};
pub use value::{ColumnType, Value, ValueType};
