//! Storage abstractions and the in-memory implementation

pub mod memory;
pub mod traits;

pub use memory::InMemoryStore;
pub use traits::{CatalogStore, JobStore, ScopeStore};
