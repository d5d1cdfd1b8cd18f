//! Utility functions shared across layers.
//!
//! - [`code_generator`] - Short code generation with collision retry

pub mod code_generator;
