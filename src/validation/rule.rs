use regex::Regex;

use crate::core::{EavError, Result, Value};

/// One atom of a validation rule expression.
///
/// Rule expressions use the pipe syntax the attribute metadata stores them
/// in, e.g. `required|max:255` or `numeric|min:0`.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Integer,
    Numeric,
    Boolean,
    Max(f64),
    Min(f64),
    In(Vec<String>),
    Regex(Regex),
}

impl Rule {
    /// The atom as written, used in failure reports.
    pub fn name(&self) -> String {
        match self {
            Self::Required => "required".into(),
            Self::Integer => "integer".into(),
            Self::Numeric => "numeric".into(),
            Self::Boolean => "boolean".into(),
            Self::Max(n) => format!("max:{}", n),
            Self::Min(n) => format!("min:{}", n),
            Self::In(options) => format!("in:{}", options.join(",")),
            Self::Regex(re) => format!("regex:{}", re.as_str()),
        }
    }

    /// Check one value. All rules except `required` pass on NULL, so an
    /// optional attribute can simply be absent.
    pub fn check(&self, value: &Value) -> bool {
        if value.is_null() {
            return !matches!(self, Self::Required);
        }
        match self {
            Self::Required => match value {
                Value::Text(s) => !s.is_empty(),
                _ => true,
            },
            Self::Integer => matches!(value, Value::Int(_)),
            Self::Numeric => value.is_numeric(),
            Self::Boolean => matches!(value, Value::Bool(_)),
            Self::Max(limit) => match value {
                Value::Text(s) => s.chars().count() as f64 <= *limit,
                other => other.as_f64().is_some_and(|n| n <= *limit),
            },
            Self::Min(limit) => match value {
                Value::Text(s) => s.chars().count() as f64 >= *limit,
                other => other.as_f64().is_some_and(|n| n >= *limit),
            },
            Self::In(options) => options.iter().any(|opt| *opt == value.to_string()),
            Self::Regex(re) => match value {
                Value::Text(s) => re.is_match(s),
                _ => false,
            },
        }
    }
}

/// Parse a pipe-separated rule expression. An unparseable atom is a
/// configuration error: rules live in attribute metadata, not user input.
pub fn parse_rules(expr: &str) -> Result<Vec<Rule>> {
    expr.split('|')
        .map(str::trim)
        .filter(|atom| !atom.is_empty())
        .map(parse_atom)
        .collect()
}

fn parse_atom(atom: &str) -> Result<Rule> {
    let (name, arg) = match atom.split_once(':') {
        Some((name, arg)) => (name, Some(arg)),
        None => (atom, None),
    };

    let rule = match (name, arg) {
        ("required", None) => Rule::Required,
        ("integer", None) => Rule::Integer,
        ("numeric", None) => Rule::Numeric,
        ("boolean", None) => Rule::Boolean,
        ("max", Some(arg)) => Rule::Max(parse_number(atom, arg)?),
        ("min", Some(arg)) => Rule::Min(parse_number(atom, arg)?),
        ("in", Some(arg)) => Rule::In(arg.split(',').map(str::to_string).collect()),
        ("regex", Some(arg)) => Rule::Regex(Regex::new(arg).map_err(|e| {
            EavError::ConfigurationMissing(format!("Invalid validation rule '{}': {}", atom, e))
        })?),
        _ => {
            return Err(EavError::ConfigurationMissing(format!(
                "Unknown validation rule '{}'",
                atom
            )))
        }
    };
    Ok(rule)
}

fn parse_number(atom: &str, arg: &str) -> Result<f64> {
    arg.parse().map_err(|_| {
        EavError::ConfigurationMissing(format!("Invalid validation rule '{}'", atom))
    })
}
