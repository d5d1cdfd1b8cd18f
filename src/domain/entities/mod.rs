//! Core domain entities.
//!
//! - [`UrlMapping`] - A short code and the URL it resolves to

pub mod mapping;

pub use mapping::UrlMapping;
