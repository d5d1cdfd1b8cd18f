//! Application layer services implementing business logic.
//!
//! Services consume the storage traits of the domain layer and provide a
//! clean API for HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Short link creation and lookup

pub mod services;
