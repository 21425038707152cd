use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::config::{EmbeddingRefresh, MovieRepositoryConfig};
use crate::embedding::MovieEmbedder;
use crate::error::{MovieError, MovieResult};
use crate::filter::{FilterSpec, sort_movies};
use crate::models::{
    CreateMovie, Movie, MovieList, MovieLookup, MovieNames, RowsAffected, UpdateFieldRequest,
    UpdateMovie,
};

/// Repository trait for movie persistence and similarity search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Embed the names and insert a new record
    async fn create(&self, input: CreateMovie) -> MovieResult<Movie>;

    /// First record matching every set field of `lookup`
    async fn get_single(&self, lookup: MovieLookup) -> MovieResult<Movie>;

    /// One page of matching records plus the total match count
    async fn get_list(&self, filter: FilterSpec) -> MovieResult<MovieList>;

    /// Replace all three names of an existing record
    async fn update(&self, input: UpdateMovie) -> MovieResult<Movie>;

    /// Delete by id
    async fn delete(&self, id: Uuid) -> MovieResult<()>;

    /// Patch columns on every row matching the filter
    async fn update_field(&self, request: UpdateFieldRequest) -> MovieResult<RowsAffected>;

    /// Nearest records to the embedded query text, closest first
    ///
    /// Only the name fields are read; a lookup carrying an `id` is a
    /// validation error.
    async fn search(&self, query: MovieLookup) -> MovieResult<MovieList>;
}

/// Error for a lookup that matched nothing
pub(crate) fn not_found(lookup: &MovieLookup) -> MovieError {
    match lookup.id {
        Some(id) => MovieError::NotFound(id),
        None => MovieError::NoMatch,
    }
}

#[derive(Debug, Clone)]
struct StoredMovie {
    movie: Movie,
    embedding: Vec<f32>,
}

fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// In-memory implementation of MovieRepository (for development/testing)
#[derive(Clone)]
pub struct InMemoryMovieRepository {
    movies: Arc<RwLock<HashMap<Uuid, StoredMovie>>>,
    embedder: Arc<MovieEmbedder>,
    config: MovieRepositoryConfig,
}

impl InMemoryMovieRepository {
    pub fn new(embedder: Arc<MovieEmbedder>) -> Self {
        Self::with_config(embedder, MovieRepositoryConfig::default())
    }

    pub fn with_config(embedder: Arc<MovieEmbedder>, config: MovieRepositoryConfig) -> Self {
        Self {
            movies: Arc::new(RwLock::new(HashMap::new())),
            embedder,
            config,
        }
    }

    fn matching(movies: &HashMap<Uuid, StoredMovie>, filter: &FilterSpec) -> Vec<Movie> {
        let mut result: Vec<Movie> = movies
            .values()
            .filter(|stored| filter.matches(&stored.movie))
            .map(|stored| stored.movie.clone())
            .collect();
        sort_movies(&mut result, &filter.ordering());
        result
    }
}

#[async_trait]
impl MovieRepository for InMemoryMovieRepository {
    #[instrument(skip(self, input))]
    async fn create(&self, input: CreateMovie) -> MovieResult<Movie> {
        input.validate()?;
        let embedding = self.embedder.embed_names(&input.names()).await?;

        let now = Utc::now();
        let movie = Movie {
            id: Uuid::now_v7(),
            name_uz: input.name_uz,
            name_ru: input.name_ru,
            name_en: input.name_en,
            created_at: now,
            updated_at: now,
            distance: None,
        };

        self.movies.write().await.insert(
            movie.id,
            StoredMovie {
                movie: movie.clone(),
                embedding,
            },
        );

        tracing::info!(movie_id = %movie.id, "Created movie");
        Ok(movie)
    }

    #[instrument(skip(self))]
    async fn get_single(&self, lookup: MovieLookup) -> MovieResult<Movie> {
        let filter = lookup.to_filter()?;
        filter.validate()?;

        let movies = self.movies.read().await;
        Self::matching(&movies, &filter)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(&lookup))
    }

    #[instrument(skip(self))]
    async fn get_list(&self, filter: FilterSpec) -> MovieResult<MovieList> {
        filter.validate()?;
        let pagination = filter.pagination();

        let movies = self.movies.read().await;
        let matching = Self::matching(&movies, &filter);
        let count = matching.len() as u64;

        let items = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .collect();

        Ok(MovieList { items, count })
    }

    #[instrument(skip(self, input), fields(movie_id = %input.id))]
    async fn update(&self, input: UpdateMovie) -> MovieResult<Movie> {
        input.validate()?;

        let embedding = match self.config.embedding_refresh {
            EmbeddingRefresh::Regenerate => Some(self.embedder.embed_names(&input.names()).await?),
            EmbeddingRefresh::Preserve => None,
        };

        let mut movies = self.movies.write().await;
        let stored = movies
            .get_mut(&input.id)
            .ok_or(MovieError::NotFound(input.id))?;

        stored.movie.name_uz = input.name_uz;
        stored.movie.name_ru = input.name_ru;
        stored.movie.name_en = input.name_en;
        stored.movie.updated_at = Utc::now().max(stored.movie.created_at);
        if let Some(embedding) = embedding {
            stored.embedding = embedding;
        }

        tracing::info!(movie_id = %input.id, "Updated movie");
        Ok(stored.movie.clone())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> MovieResult<()> {
        let mut movies = self.movies.write().await;
        movies.remove(&id).ok_or(MovieError::NotFound(id))?;

        tracing::info!(movie_id = %id, "Deleted movie");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_field(&self, request: UpdateFieldRequest) -> MovieResult<RowsAffected> {
        request.validate_request()?;

        // Embed from a snapshot so no lock is held across provider calls
        let mut embeddings = HashMap::new();
        if self.config.embedding_refresh == EmbeddingRefresh::Regenerate {
            let snapshot: Vec<(Uuid, MovieNames)> = {
                let movies = self.movies.read().await;
                movies
                    .values()
                    .filter(|stored| request.filter.matches(&stored.movie))
                    .map(|stored| {
                        let mut names = stored.movie.names();
                        request.apply_to(&mut names);
                        (stored.movie.id, names)
                    })
                    .collect()
            };

            for (id, names) in snapshot {
                let embedding = self.embedder.embed_names(&names).await?;
                embeddings.insert(id, (names, embedding));
            }
        }

        let now = Utc::now();
        let mut movies = self.movies.write().await;
        let mut rows_affected = 0;

        for stored in movies.values_mut() {
            if !request.filter.matches(&stored.movie) {
                continue;
            }

            let mut names = stored.movie.names();
            request.apply_to(&mut names);
            // A row renamed since the snapshot keeps its old vector
            if let Some((embedded, embedding)) = embeddings.remove(&stored.movie.id) {
                if embedded == names {
                    stored.embedding = embedding;
                }
            }

            stored.movie.name_uz = names.name_uz;
            stored.movie.name_ru = names.name_ru;
            stored.movie.name_en = names.name_en;
            stored.movie.updated_at = now.max(stored.movie.created_at);
            rows_affected += 1;
        }

        tracing::info!(rows_affected, "Patched movies");
        Ok(RowsAffected { rows_affected })
    }

    #[instrument(skip(self))]
    async fn search(&self, query: MovieLookup) -> MovieResult<MovieList> {
        let names = query.search_names()?;
        let vector = self.embedder.embed_names(&names).await?;

        let movies = self.movies.read().await;
        let mut hits: Vec<Movie> = movies
            .values()
            .map(|stored| Movie {
                distance: Some(euclidean(&stored.embedding, &vector)),
                ..stored.movie.clone()
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(self.config.search_limit as usize);

        Ok(MovieList {
            count: hits.len() as u64,
            items: hits,
        })
    }
}
