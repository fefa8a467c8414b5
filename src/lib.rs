// ============================================================================
// eavdb Library
// ============================================================================

//! Attribute-aware Entity-Attribute-Value persistence.
//!
//! Entities whose attribute sets are declared at runtime are stored as one
//! main-table row (static columns) plus one row per dynamic attribute in a
//! per-value-type table. The persistence engine splits a record's fields
//! into the two buckets, resolves attribute metadata through process-wide
//! caches, sequences all writes inside one transaction and fires a vetoable
//! lifecycle phase chain around each step. An optional flat table can be
//! swapped in per entity type to bypass the splitting entirely.
//!
//! # Examples
//!
//! ```
//! use eavdb::{AttributeDefinition, Column, ColumnType, EavDatabase, EntityDefinition, ValueType};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> eavdb::Result<()> {
//! let db = EavDatabase::new().await?;
//!
//! db.register_entity(
//!     EntityDefinition::new("product", "products")
//!         .column(Column::new("name", ColumnType::Text).not_null())
//!         .column(Column::new("sku", ColumnType::Text).unique()),
//! )
//! .await?;
//! db.add_attribute(
//!     "product",
//!     AttributeDefinition::new("name", ValueType::Varchar)
//!         .static_storage()
//!         .rules("required|max:255"),
//! )
//! .await?;
//! db.add_attribute(
//!     "product",
//!     AttributeDefinition::new("sku", ValueType::Varchar).static_storage(),
//! )
//! .await?;
//! db.add_attribute("product", AttributeDefinition::new("color", ValueType::Text))
//!     .await?;
//!
//! let mut widget = db.new_record("product");
//! widget.set("name", "Widget").set("sku", "W-1").set("color", "red");
//!
//! let outcome = db.save(&mut widget).await?;
//! assert!(outcome.is_saved());
//! assert!(widget.id().is_some());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod engine;
pub mod facade;
pub mod metadata;
pub mod storage;
pub mod transaction;
pub mod validation;

// Re-export main types for convenience
pub use crate::core::{Column, ColumnType, EavError, Result, Row, Schema, Value, ValueType};
pub use engine::{
    AttributeValueStore, EntityRecord, FnHook, HookDecision, LifecycleHook, LifecyclePhase,
    PersistenceEngine, SaveOutcome,
};
pub use facade::{AttributeDefinition, EavDatabase, EntityDefinition};
pub use metadata::{
    AttributeDescriptor, AttributeLoader, AttributeSet, EntityRegistry, EntityType,
    LoadedAttributes,
};
pub use storage::{Filter, MemoryBackend, TableSchema};
pub use transaction::{Transaction, TransactionId};
pub use validation::ValidationFailure;
