//! Process-local mapping store.

use std::collections::HashMap;

use crate::domain::entities::UrlMapping;
use crate::domain::repositories::MappingStore;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;

/// In-memory [`MappingStore`] backed by a `HashMap` behind an async `RwLock`.
///
/// Mappings live for the lifetime of the process. An optional capacity turns
/// into a [`AppError::Storage`] once reached, which keeps memory bounded on
/// long-running instances.
pub struct InMemoryMappingStore {
    mappings: RwLock<HashMap<String, UrlMapping>>,
    capacity: Option<usize>,
}

impl InMemoryMappingStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self {
            mappings: RwLock::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Creates a store that rejects writes once `capacity` mappings are held.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            mappings: RwLock::new(HashMap::with_capacity(capacity.min(1024))),
            capacity: Some(capacity),
        }
    }

    /// Number of stored mappings.
    pub async fn len(&self) -> usize {
        self.mappings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.read().await.is_empty()
    }
}

impl Default for InMemoryMappingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn exists(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.mappings.read().await.contains_key(code))
    }

    async fn store(&self, mapping: UrlMapping) -> Result<(), AppError> {
        let mut mappings = self.mappings.write().await;

        if mappings.contains_key(&mapping.code) {
            return Err(AppError::storage(
                format!("Short code '{}' is already stored", mapping.code),
                json!({ "code": mapping.code }),
            ));
        }

        if let Some(capacity) = self.capacity
            && mappings.len() >= capacity
        {
            return Err(AppError::storage(
                "Mapping store is full",
                json!({ "capacity": capacity }),
            ));
        }

        mappings.insert(mapping.code.clone(), mapping);
        Ok(())
    }

    async fn get(&self, code: &str) -> Result<Option<UrlMapping>, AppError> {
        Ok(self.mappings.read().await.get(code).cloned())
    }
}
