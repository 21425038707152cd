use std::time::Duration;

use core_config::ConfigError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::vector_literal::VectorLiteralError;

#[derive(Debug, Error)]
pub enum MovieError {
    #[error("Movie not found: {0}")]
    NotFound(Uuid),

    /// A lookup by names matched no row
    #[error("No movie matches the lookup")]
    NoMatch,

    /// Caller input was rejected before any store or provider call
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MovieError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MovieError::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MovieError::NotFound(_) | MovieError::NoMatch)
    }
}

pub type MovieResult<T> = Result<T, MovieError>;

impl From<DbErr> for MovieError {
    fn from(err: DbErr) -> Self {
        MovieError::Storage(err.to_string())
    }
}

impl From<validator::ValidationErrors> for MovieError {
    fn from(err: validator::ValidationErrors) -> Self {
        MovieError::Validation(err.to_string())
    }
}

impl From<ConfigError> for MovieError {
    fn from(err: ConfigError) -> Self {
        MovieError::Config(err.to_string())
    }
}

/// Failure of the text-embedding provider or of its response
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding provider rate limited the request (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Embedding provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Embedding transport error: {0}")]
    Transport(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No text to embed")]
    EmptyInput,

    #[error("Embedding provider configuration error: {0}")]
    Config(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

impl EmbeddingError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Timeout(_)
            | EmbeddingError::RateLimited { .. }
            | EmbeddingError::Transport(_) => true,
            EmbeddingError::Provider { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Minimum wait the provider asked for before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            EmbeddingError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<VectorLiteralError> for EmbeddingError {
    fn from(err: VectorLiteralError) -> Self {
        EmbeddingError::MalformedResponse(err.to_string())
    }
}
