//! Movies Domain
//!
//! A movie catalogue stored in PostgreSQL, where every record carries names in
//! Uzbek, Russian and English plus one embedding vector derived from them. The
//! vector lives in a pgvector `vector` column so records can be found by
//! semantic similarity as well as by structured filters.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ MovieRepository  │  ← CRUD, bulk patch, similarity search
//! └───┬─────────┬────┘
//!     │         │
//! ┌───▼────┐ ┌──▼──────────────┐
//! │ Filter │ │  MovieEmbedder  │  ← first non-blank name → one vector
//! └───┬────┘ └──┬──────────────┘
//!     │         │
//! ┌───▼────┐ ┌──▼──────────────┐
//! │ Entity │ │ EmbeddingProvider│ ← OpenAI, or hashing for offline use
//! └───┬────┘ └─────────────────┘
//!     │
//! ┌───▼──────────────┐
//! │ PostgreSQL +     │  ← `movies` table, `vector(1536)` + HNSW index
//! │ pgvector         │
//! └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use core_config::FromEnv;
//! use domain_movies::{
//!     CreateMovie, EmbeddingConfig, MovieEmbedder, MovieLookup, MovieRepository,
//!     OpenAIProvider, PgMovieRepository,
//! };
//!
//! # async fn run(db: sea_orm::DatabaseConnection) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EmbeddingConfig::from_env()?;
//! let provider = Arc::new(OpenAIProvider::new(&config)?);
//! let embedder = Arc::new(MovieEmbedder::from_config(provider, &config)?);
//!
//! let repository = PgMovieRepository::new(db, embedder);
//! repository
//!     .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
//!     .await?;
//!
//! let hits = repository.search(MovieLookup::text("mirage")).await?;
//! println!("{} similar movies", hits.count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod embedding;
pub mod entity;
pub mod error;
pub mod filter;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod vector_literal;

// Re-export commonly used types
pub use config::{EmbeddingConfig, EmbeddingRefresh, ListConsistency, MovieRepositoryConfig};
pub use embedding::{EmbeddingProvider, HashingProvider, MovieEmbedder, OpenAIProvider};
pub use error::{EmbeddingError, EmbeddingResult, MovieError, MovieResult};
pub use filter::{
    FieldValue, FilterCondition, FilterField, FilterGroup, FilterSpec, MatchMode, OrderBy,
    Pagination, SortDirection,
};
pub use models::{
    CreateMovie, FieldPatch, Locale, Movie, MovieList, MovieLookup, MovieNames, PatchableColumn,
    RowsAffected, UpdateFieldRequest, UpdateMovie,
};
pub use postgres::PgMovieRepository;
pub use repository::{InMemoryMovieRepository, MovieRepository};
