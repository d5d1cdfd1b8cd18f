//! Storage trait for code to URL mappings.

use crate::domain::entities::UrlMapping;
use crate::error::AppError;
use async_trait::async_trait;

/// Key/value store owning every [`UrlMapping`].
///
/// The code generator only ever asks [`MappingStore::exists`]; writes go
/// through [`MappingStore::store`] once a unique code has been found.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::InMemoryMappingStore`] - process-local map
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Returns whether a mapping for `code` is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the store cannot be queried.
    async fn exists(&self, code: &str) -> Result<bool, AppError>;

    /// Persists a new mapping.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the code is already taken or the
    /// store rejects the write.
    async fn store(&self, mapping: UrlMapping) -> Result<(), AppError>;

    /// Looks up the mapping for `code`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Storage`] if the store cannot be queried.
    async fn get(&self, code: &str) -> Result<Option<UrlMapping>, AppError>;
}
