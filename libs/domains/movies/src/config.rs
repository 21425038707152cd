use std::fmt;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_or_default, env_parse, env_required};
use database::RetryConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;

/// Embedding provider settings
#[derive(Clone)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Length of every vector; must match the `vector(N)` column
    pub dimension: usize,
    /// Budget for a single provider call, per attempt
    pub timeout_ms: u64,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
}

impl EmbeddingConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            timeout_ms: 10_000,
            max_retries: 2,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_initial_delay(200)
            .with_max_delay(self.timeout_ms.max(200))
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl FromEnv for EmbeddingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let dimension: usize = env_parse("EMBEDDING_DIMENSION", "1536")?;
        if dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            api_key: env_required("OPENAI_API_KEY")?,
            base_url: env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            model: env_or_default("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            dimension,
            timeout_ms: env_parse("EMBEDDING_TIMEOUT_MS", "10000")?,
            max_retries: env_parse("EMBEDDING_MAX_RETRIES", "2")?,
        })
    }
}

/// What `update` does with the stored embedding when names change
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EmbeddingRefresh {
    /// Keep the vector computed at creation
    #[default]
    Preserve,
    /// Recompute the vector from the new names
    Regenerate,
}

/// How `get_list` reads its page and count
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ListConsistency {
    /// Two separate statements; the count may be off by concurrent writes
    #[default]
    Independent,
    /// Both statements in one REPEATABLE READ, read-only transaction
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRepositoryConfig {
    /// Number of neighbours returned by search
    pub search_limit: u64,
    pub embedding_refresh: EmbeddingRefresh,
    pub list_consistency: ListConsistency,
}

impl MovieRepositoryConfig {
    pub fn with_embedding_refresh(mut self, refresh: EmbeddingRefresh) -> Self {
        self.embedding_refresh = refresh;
        self
    }

    pub fn with_list_consistency(mut self, consistency: ListConsistency) -> Self {
        self.list_consistency = consistency;
        self
    }

    pub fn with_search_limit(mut self, limit: u64) -> Self {
        self.search_limit = limit;
        self
    }
}

impl Default for MovieRepositoryConfig {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            embedding_refresh: EmbeddingRefresh::default(),
            list_consistency: ListConsistency::default(),
        }
    }
}

impl FromEnv for MovieRepositoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let search_limit: u64 = env_parse("MOVIE_SEARCH_LIMIT", "10")?;
        if search_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MOVIE_SEARCH_LIMIT".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            search_limit,
            embedding_refresh: env_parse("MOVIE_EMBEDDING_REFRESH", "preserve")?,
            list_consistency: env_parse("MOVIE_LIST_CONSISTENCY", "independent")?,
        })
    }
}
