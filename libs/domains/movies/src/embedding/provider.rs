use async_trait::async_trait;

use crate::error::EmbeddingResult;

/// Trait for embedding generation providers
///
/// Implementations may call a remote API or compute vectors locally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Length of every returned vector
    fn dimension(&self) -> usize;

    /// Embed `texts`, one vector per input in the same order
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;
}
