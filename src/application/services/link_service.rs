//! Link creation and retrieval service.

use std::sync::Arc;

use crate::domain::entities::UrlMapping;
use crate::domain::repositories::MappingStore;
use crate::error::AppError;
use crate::utils::code_generator::CodeGenerator;
use serde_json::json;

/// Service for creating and resolving short links.
///
/// Generates a code that is unused in the store, composes the short URL from
/// the configured base URL and persists the mapping.
pub struct LinkService<S: MappingStore> {
    store: Arc<S>,
    generator: CodeGenerator,
    base_url: String,
}

impl<S: MappingStore> LinkService<S> {
    /// Creates a new link service.
    ///
    /// `base_url` is the public prefix of short URLs, e.g. `https://s.example.com`.
    pub fn new(store: Arc<S>, generator: CodeGenerator, base_url: impl Into<String>) -> Self {
        Self {
            store,
            generator,
            base_url: base_url.into(),
        }
    }

    /// Creates and stores a mapping for `long_url`.
    ///
    /// # Errors
    ///
    /// - [`AppError::GenerationExhausted`] if no unused code was found
    /// - [`AppError::Storage`] if the store fails
    pub async fn create_short_link(&self, long_url: String) -> Result<UrlMapping, AppError> {
        let code = self.generator.generate_unique(self.store.clone()).await?;
        let short_url = self.short_url(&code);

        let mapping = UrlMapping::new(code, long_url, short_url);
        self.store.store(mapping.clone()).await?;

        tracing::debug!(code = %mapping.code, "Short link created");
        Ok(mapping)
    }

    /// Retrieves a mapping by its short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no mapping matches the code.
    /// Returns [`AppError::Storage`] on store errors.
    pub async fn get_mapping(&self, code: &str) -> Result<UrlMapping, AppError> {
        self.store.get(code).await?.ok_or_else(|| {
            AppError::not_found(
                format!("Short link '{code}' not found"),
                json!({ "code": code }),
            )
        })
    }

    /// Constructs the full short URL for a code.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockMappingStore;
    use crate::infrastructure::persistence::InMemoryMappingStore;
    use std::collections::HashSet;

    fn service(store: MockMappingStore) -> LinkService<MockMappingStore> {
        LinkService::new(Arc::new(store), CodeGenerator::new(3), "http://x/")
    }

    #[tokio::test]
    async fn test_create_short_link_success() {
        let mut store = MockMappingStore::new();
        store.expect_exists().times(1).returning(|_| Ok(false));
        store
            .expect_store()
            .withf(|mapping| mapping.original_url == "https://example.com")
            .times(1)
            .returning(|_| Ok(()));

        let mapping = service(store)
            .create_short_link("https://example.com".to_string())
            .await
            .unwrap();

        assert_eq!(mapping.short_url, format!("http://x/{}", mapping.code));
    }

    #[tokio::test]
    async fn test_create_short_link_exhausted() {
        let mut store = MockMappingStore::new();
        store.expect_exists().times(3).returning(|_| Ok(true));
        store.expect_store().times(0);

        let err = service(store)
            .create_short_link("https://example.com".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationExhausted { .. }));
    }

    #[tokio::test]
    async fn test_create_short_link_storage_error() {
        let mut store = MockMappingStore::new();
        store.expect_exists().returning(|_| Ok(false));
        store
            .expect_store()
            .returning(|_| Err(AppError::storage("write failed", json!({}))));

        let err = service(store)
            .create_short_link("https://example.com".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_get_mapping_not_found() {
        let mut store = MockMappingStore::new();
        store.expect_get().returning(|_| Ok(None));

        let err = service(store).get_mapping("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_short_url_trims_trailing_slash() {
        let service = service(MockMappingStore::new());
        assert_eq!(service.short_url("abc"), "http://x/abc");
    }

    #[tokio::test]
    async fn test_generated_codes_are_pairwise_distinct() {
        let store = Arc::new(InMemoryMappingStore::new());
        let service = LinkService::new(store.clone(), CodeGenerator::default(), "http://x");

        let mut codes = HashSet::new();
        for i in 0..200 {
            let mapping = service
                .create_short_link(format!("https://example.com/{i}"))
                .await
                .unwrap();
            codes.insert(mapping.code);
        }

        assert_eq!(codes.len(), 200);
        assert_eq!(store.len().await, 200);
    }
}
