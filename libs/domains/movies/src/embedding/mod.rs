//! Text embedding: providers plus the adapter that turns a movie's names
//! into one stored vector.

mod embedder;
mod hashing;
mod openai;
mod provider;

pub use embedder::MovieEmbedder;
pub use hashing::HashingProvider;
pub use openai::OpenAIProvider;
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
