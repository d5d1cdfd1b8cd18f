//! Domain layer: entities and storage contracts.
//!
//! - [`entities`] - Core data structures
//! - [`repositories`] - Storage trait definitions
//!
//! The domain layer has no dependency on infrastructure or transport code.

pub mod entities;
pub mod repositories;
