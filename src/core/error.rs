use thiserror::Error;

use crate::validation::ValidationFailure;

#[derive(Error, Debug)]
pub enum EavError {
    #[error("Entity type '{0}' is not registered")]
    ConfigurationMissing(String),

    #[error("Attribute '{code}' is not declared for entity type '{entity}'")]
    UnknownAttribute { entity: String, code: String },

    #[error("Validation failed for {} attribute(s): {}", .0.len(), format_failures(.0))]
    ValidationFailed(Vec<ValidationFailure>),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, EavError>;

fn format_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ValidationFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
