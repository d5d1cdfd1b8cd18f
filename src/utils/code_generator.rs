//! Short code generation with bounded collision retry.
//!
//! Codes are drawn from the OS random source and encoded as URL-safe base64.
//! [`CodeGenerator::generate_unique`] checks each candidate against the
//! [`MappingStore`] and gives up after a fixed number of attempts.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::repositories::MappingStore;
use crate::error::AppError;
use base64::Engine as _;
use serde_json::json;
use tokio_retry::RetryIf;

/// Length of random bytes before base64 encoding.
const CODE_LENGTH_BYTES: usize = 9;

/// Default number of candidates tried before giving up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Generates a cryptographically secure random short code.
///
/// Uses `getrandom` for entropy and encodes the result as URL-safe base64
/// without padding, producing a 12-character code.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the system random source fails.
pub fn generate_code() -> Result<String, AppError> {
    let mut buffer = [0u8; CODE_LENGTH_BYTES];

    getrandom::fill(&mut buffer).map_err(|e| {
        AppError::internal(
            "Random source unavailable",
            json!({ "reason": e.to_string() }),
        )
    })?;

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer))
}

/// Outcome of a single candidate attempt.
enum Attempt {
    Collision,
    Failed(AppError),
}

/// Produces codes that are unused in a given store.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    max_attempts: usize,
}

impl CodeGenerator {
    /// Creates a generator trying at most `max_attempts` candidates (minimum 1).
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Returns a code for which `store.exists` reported `false`.
    ///
    /// Each collision is retried immediately with a fresh candidate. Storage
    /// errors abort the loop without further attempts.
    ///
    /// # Errors
    ///
    /// - [`AppError::GenerationExhausted`] after `max_attempts` collisions
    /// - [`AppError::Storage`] (or whatever the store returns) on store failure
    pub async fn generate_unique<S>(&self, store: Arc<S>) -> Result<String, AppError>
    where
        S: MappingStore + ?Sized,
    {
        self.generate_unique_with(store, generate_code).await
    }

    /// Same as [`Self::generate_unique`] with an explicit candidate source.
    pub async fn generate_unique_with<S, F>(
        &self,
        store: Arc<S>,
        mut candidate: F,
    ) -> Result<String, AppError>
    where
        S: MappingStore + ?Sized,
        F: FnMut() -> Result<String, AppError>,
    {
        let mut attempts = 0usize;
        let retries = std::iter::repeat_n(Duration::ZERO, self.max_attempts - 1);

        let result = RetryIf::spawn(
            retries,
            || {
                attempts += 1;
                let store = store.clone();
                let code = candidate();
                async move {
                    let code = match code {
                        Ok(code) => code,
                        Err(e) => return Err(Attempt::Failed(e)),
                    };
                    match store.exists(&code).await {
                        Ok(false) => Ok(code),
                        Ok(true) => Err(Attempt::Collision),
                        Err(e) => Err(Attempt::Failed(e)),
                    }
                }
            },
            |outcome: &Attempt| matches!(outcome, Attempt::Collision),
        )
        .await;

        match result {
            Ok(code) => {
                if attempts > 1 {
                    tracing::debug!(attempts, "Unique code found after collisions");
                }
                Ok(code)
            }
            Err(Attempt::Collision) => {
                tracing::warn!(attempts, "Code generation exhausted");
                Err(AppError::generation_exhausted(
                    format!("Failed to generate a unique code after {attempts} attempts"),
                    json!({ "attempts": attempts }),
                ))
            }
            Err(Attempt::Failed(e)) => Err(e),
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockMappingStore;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_generate_code_has_correct_length() {
        let code = generate_code().unwrap();
        assert_eq!(code.len(), 12);
    }

    #[test]
    fn test_generate_code_url_safe_characters() {
        let code = generate_code().unwrap();
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert!(!code.contains('='));
    }

    #[test]
    fn test_generate_code_produces_unique_codes() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_code().unwrap()).collect();
        assert_eq!(codes.len(), 1000);
    }

    #[tokio::test]
    async fn test_first_candidate_free() {
        let mut store = MockMappingStore::new();
        store.expect_exists().times(1).returning(|_| Ok(false));

        let code = CodeGenerator::default()
            .generate_unique(Arc::new(store))
            .await
            .unwrap();
        assert_eq!(code.len(), 12);
    }

    #[tokio::test]
    async fn test_succeeds_on_tenth_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut store = MockMappingStore::new();
        store
            .expect_exists()
            .times(10)
            .returning(move |_| Ok(seen.fetch_add(1, Ordering::SeqCst) + 1 < 10));

        let result = CodeGenerator::new(10)
            .generate_unique(Arc::new(store))
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_exhausted_after_exact_max_attempts() {
        let mut store = MockMappingStore::new();
        store.expect_exists().times(7).returning(|_| Ok(true));

        let err = CodeGenerator::new(7)
            .generate_unique(Arc::new(store))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::GenerationExhausted { .. }));
        assert!(err.to_string().contains("7 attempts"));
    }

    #[tokio::test]
    async fn test_storage_error_is_not_retried() {
        let mut store = MockMappingStore::new();
        store
            .expect_exists()
            .times(1)
            .returning(|_| Err(AppError::storage("store offline", json!({}))));

        let err = CodeGenerator::new(5)
            .generate_unique(Arc::new(store))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_candidate_source_is_used() {
        let mut store = MockMappingStore::new();
        store
            .expect_exists()
            .returning(|code| Ok(code == "taken"));

        let mut candidates = vec!["free".to_string(), "taken".to_string()];
        let code = CodeGenerator::new(3)
            .generate_unique_with(Arc::new(store), || Ok(candidates.pop().unwrap()))
            .await
            .unwrap();

        assert_eq!(code, "free");
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        assert_eq!(CodeGenerator::new(0).max_attempts(), 1);
    }
}
