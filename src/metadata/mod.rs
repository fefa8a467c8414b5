pub mod attribute;
pub mod entity;
pub mod loader;
pub mod registry;

pub use attribute::AttributeDescriptor;
pub use entity::{AttributeSet, EntityType};
pub use loader::{AttributeLoader, LoadedAttributes};
pub use registry::EntityRegistry;

/// Backing-store tables the metadata layer resolves from.
pub const ENTITIES_TABLE: &str = "eav_entities";
pub const ATTRIBUTE_SETS_TABLE: &str = "eav_attribute_sets";
pub const ATTRIBUTES_TABLE: &str = "eav_attributes";
