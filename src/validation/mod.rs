pub mod rule;
pub mod validator;

pub use rule::{parse_rules, Rule};
pub use validator::{apply_rules, ValidationFailure};
