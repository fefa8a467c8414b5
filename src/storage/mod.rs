pub mod filter;
pub mod memory;
pub mod table;

pub use filter::Filter;
pub use memory::MemoryBackend;
pub use table::{Table, TableSchema};
