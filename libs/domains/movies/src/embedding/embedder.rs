use std::sync::Arc;
use std::time::Duration;

use database::RetryConfig;
use database::common::retry_with_backoff_hinted;
use migration::MOVIE_EMBEDDING_DIMENSION;
use tracing::{debug, warn};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::models::MovieNames;
use crate::vector_literal;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Turns a movie's names into the single vector stored with it.
///
/// Records and search queries go through the same function, so both live in
/// one vector space. The first non-blank name in uz, ru, en order is the text
/// that gets embedded; see [`MovieNames::embedding_text`].
pub struct MovieEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    timeout: Duration,
    retry: RetryConfig,
}

impl MovieEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let dimension = provider.dimension();
        Self {
            provider,
            dimension,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::new().with_max_retries(DEFAULT_MAX_RETRIES),
        }
    }

    /// Build from settings for the `movies` table
    ///
    /// The provider, the configured dimension and the `vector(N)` column must
    /// all agree, otherwise every write would fail at the database.
    pub fn from_config(
        provider: Arc<dyn EmbeddingProvider>,
        config: &EmbeddingConfig,
    ) -> EmbeddingResult<Self> {
        if provider.dimension() != config.dimension {
            return Err(EmbeddingError::Config(format!(
                "provider `{}` produces {} dimensions, configured {}",
                provider.name(),
                provider.dimension(),
                config.dimension
            )));
        }

        let column = MOVIE_EMBEDDING_DIMENSION as usize;
        if config.dimension != column {
            return Err(EmbeddingError::Config(format!(
                "configured {} dimensions but movies.embedding is vector({})",
                config.dimension, column
            )));
        }

        Ok(Self::new(provider)
            .with_timeout(config.timeout())
            .with_retry(config.retry_config()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub async fn embed_names(&self, names: &MovieNames) -> EmbeddingResult<Vec<f32>> {
        let text = names.embedding_text().ok_or(EmbeddingError::EmptyInput)?;

        let provider = &self.provider;
        let inputs = &[text.to_string()];
        let timeout = self.timeout;

        let vectors = retry_with_backoff_hinted(
            || async move {
                tokio::time::timeout(timeout, provider.embed_batch(inputs))
                    .await
                    .map_err(|_| EmbeddingError::Timeout(timeout))?
            },
            self.retry.clone(),
            EmbeddingError::is_transient,
            EmbeddingError::retry_after,
        )
        .await
        .inspect_err(|e| warn!(provider = provider.name(), error = %e, "Embedding failed"))?;

        let vector = match <[Vec<f32>; 1]>::try_from(vectors) {
            Ok([vector]) => vector,
            Err(vectors) => {
                return Err(EmbeddingError::MalformedResponse(format!(
                    "expected 1 embedding, got {}",
                    vectors.len()
                )));
            }
        };

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        vector_literal::validate(&vector, self.dimension)?;

        debug!(provider = provider.name(), "Embedded movie name");
        Ok(vector)
    }
}
