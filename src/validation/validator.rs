use std::fmt;

use crate::core::Value;

use super::Rule;

/// One failed rule application, carried inside
/// [`EavError::ValidationFailed`](crate::EavError::ValidationFailed).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub code: String,
    pub rule: String,
    pub value: Value,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' failed rule '{}' (value: {})",
            self.code, self.rule, self.value
        )
    }
}

/// Apply every rule to a value, collecting one failure per failing atom.
pub fn apply_rules(code: &str, rules: &[Rule], value: &Value) -> Vec<ValidationFailure> {
    rules
        .iter()
        .filter(|rule| !rule.check(value))
        .map(|rule| ValidationFailure {
            code: code.to_string(),
            rule: rule.name(),
            value: value.clone(),
        })
        .collect()
}
