pub mod hooks;
pub mod record;
pub mod save;
pub mod values;

pub use hooks::{FnHook, HookChain, HookDecision, LifecycleHook, LifecyclePhase};
pub use record::{is_reserved, EntityRecord, RESERVED_CODES};
pub use save::{PersistenceEngine, SaveOutcome};
pub use values::AttributeValueStore;
