pub mod database;

pub use database::{AttributeDefinition, EavDatabase, EntityDefinition};
