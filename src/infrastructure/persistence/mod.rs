//! Mapping store implementations.
//!
//! - [`InMemoryMappingStore`] - process-local store used by the service

mod memory_store;

pub use memory_store::InMemoryMappingStore;
