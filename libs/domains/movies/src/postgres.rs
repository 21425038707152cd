use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    AccessMode, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    IsolationLevel, QueryFilter, QuerySelect, Statement, TransactionTrait, Value,
};
use tracing::{debug, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::config::{EmbeddingRefresh, ListConsistency, MovieRepositoryConfig};
use crate::embedding::MovieEmbedder;
use crate::entity::{self, CountRow, SearchRow};
use crate::error::{MovieError, MovieResult};
use crate::filter::FilterSpec;
use crate::models::{
    CreateMovie, Movie, MovieList, MovieLookup, MovieNames, RowsAffected, UpdateFieldRequest,
    UpdateMovie,
};
use crate::repository::{MovieRepository, not_found};
use crate::vector_literal;

const INSERT_MOVIE: &str = r#"INSERT INTO movies (id, name_uz, name_ru, name_en, embedding, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5::vector, now(), now())
RETURNING id, name_uz, name_ru, name_en, created_at, updated_at"#;

const UPDATE_NAMES: &str = r#"UPDATE movies SET name_uz = $1, name_ru = $2, name_en = $3, updated_at = now()
WHERE id = $4
RETURNING id, name_uz, name_ru, name_en, created_at, updated_at"#;

const UPDATE_NAMES_AND_EMBEDDING: &str = r#"UPDATE movies SET name_uz = $1, name_ru = $2, name_en = $3, embedding = $5::vector, updated_at = now()
WHERE id = $4
RETURNING id, name_uz, name_ru, name_en, created_at, updated_at"#;

/// `<->` is pgvector's Euclidean distance; ordering by it alone lets the
/// HNSW index serve the query.
const SEARCH_NEAREST: &str = r#"SELECT id, name_uz, name_ru, name_en, created_at, updated_at, embedding <-> $1::vector AS distance
FROM movies
ORDER BY distance
LIMIT $2"#;

/// PostgreSQL + pgvector implementation of [`MovieRepository`]
///
/// Plain column reads and writes go through the SeaORM entity. Statements that
/// touch the `embedding` column are raw SQL with the vector bound as a text
/// literal and cast with `::vector`.
pub struct PgMovieRepository {
    db: DatabaseConnection,
    embedder: Arc<MovieEmbedder>,
    config: MovieRepositoryConfig,
}

impl PgMovieRepository {
    pub fn new(db: DatabaseConnection, embedder: Arc<MovieEmbedder>) -> Self {
        Self::with_config(db, embedder, MovieRepositoryConfig::default())
    }

    pub fn with_config(
        db: DatabaseConnection,
        embedder: Arc<MovieEmbedder>,
        config: MovieRepositoryConfig,
    ) -> Self {
        Self {
            db,
            embedder,
            config,
        }
    }

    async fn embed(&self, names: &MovieNames) -> MovieResult<String> {
        let vector = self.embedder.embed_names(names).await?;
        Ok(vector_literal::encode(&vector))
    }

    fn update_statement(id: Uuid, names: MovieNames, embedding: Option<String>) -> Statement {
        let mut values = vec![
            Value::from(names.name_uz),
            Value::from(names.name_ru),
            Value::from(names.name_en),
            Value::from(id),
        ];
        let sql = match embedding {
            Some(literal) => {
                values.push(Value::from(literal));
                UPDATE_NAMES_AND_EMBEDDING
            }
            None => UPDATE_NAMES,
        };
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    /// Page and count on one connection or transaction
    async fn list_on<C: ConnectionTrait>(conn: &C, filter: &FilterSpec) -> MovieResult<MovieList> {
        let models = filter.page_select()?.all(conn).await?;

        let count = filter
            .count_select()?
            .into_model::<CountRow>()
            .one(conn)
            .await?
            .map(|row| row.count.max(0) as u64)
            .unwrap_or(0);

        Ok(MovieList {
            items: models.into_iter().map(Movie::from).collect(),
            count,
        })
    }

    /// Re-embed and rewrite every matching row inside one transaction
    async fn update_field_regenerating(&self, request: &UpdateFieldRequest) -> MovieResult<u64> {
        let txn = self.db.begin().await?;

        let rows = request.filter.select()?.lock_exclusive().all(&txn).await?;

        let mut rows_affected = 0;
        for row in rows {
            let mut names = MovieNames::new(row.name_uz, row.name_ru, row.name_en);
            request.apply_to(&mut names);
            let literal = self.embed(&names).await?;

            let result = txn
                .execute_raw(Self::update_statement(row.id, names, Some(literal)))
                .await?;
            rows_affected += result.rows_affected();
        }

        txn.commit().await?;
        Ok(rows_affected)
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    #[instrument(skip(self, input))]
    async fn create(&self, input: CreateMovie) -> MovieResult<Movie> {
        input.validate()?;
        let literal = self.embed(&input.names()).await?;

        let id = Uuid::now_v7();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_MOVIE,
            [
                Value::from(id),
                Value::from(input.name_uz),
                Value::from(input.name_ru),
                Value::from(input.name_en),
                Value::from(literal),
            ],
        );

        let model = entity::Model::find_by_statement(stmt)
            .one(&self.db)
            .await?
            .ok_or_else(|| MovieError::Storage("insert returned no row".to_string()))?;

        tracing::info!(movie_id = %model.id, "Created movie");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    async fn get_single(&self, lookup: MovieLookup) -> MovieResult<Movie> {
        let filter = lookup.to_filter()?;

        let model = filter.select()?.one(&self.db).await?;
        model.map(Movie::from).ok_or_else(|| not_found(&lookup))
    }

    #[instrument(skip(self))]
    async fn get_list(&self, filter: FilterSpec) -> MovieResult<MovieList> {
        filter.validate()?;

        match self.config.list_consistency {
            ListConsistency::Independent => Self::list_on(&self.db, &filter).await,
            ListConsistency::Snapshot => {
                let txn = self
                    .db
                    .begin_with_config(
                        Some(IsolationLevel::RepeatableRead),
                        Some(AccessMode::ReadOnly),
                    )
                    .await?;
                let list = Self::list_on(&txn, &filter).await?;
                txn.commit().await?;
                Ok(list)
            }
        }
    }

    #[instrument(skip(self, input), fields(movie_id = %input.id))]
    async fn update(&self, input: UpdateMovie) -> MovieResult<Movie> {
        input.validate()?;
        let names = input.names();

        let embedding = match self.config.embedding_refresh {
            EmbeddingRefresh::Regenerate => Some(self.embed(&names).await?),
            EmbeddingRefresh::Preserve => None,
        };

        let model = entity::Model::find_by_statement(Self::update_statement(input.id, names, embedding))
            .one(&self.db)
            .await?
            .ok_or(MovieError::NotFound(input.id))?;

        tracing::info!(movie_id = %input.id, "Updated movie");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> MovieResult<()> {
        let result = entity::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(MovieError::NotFound(id));
        }

        tracing::info!(movie_id = %id, "Deleted movie");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_field(&self, request: UpdateFieldRequest) -> MovieResult<RowsAffected> {
        request.validate_request()?;

        let rows_affected = match self.config.embedding_refresh {
            EmbeddingRefresh::Regenerate => self.update_field_regenerating(&request).await?,
            EmbeddingRefresh::Preserve => {
                let update = request.items.iter().fold(
                    entity::Entity::update_many(),
                    |update, patch| {
                        update.col_expr(patch.column.field().column(), Expr::value(patch.value.to_value()))
                    },
                );

                update
                    .col_expr(entity::Column::UpdatedAt, Expr::current_timestamp().into())
                    .filter(request.filter.condition()?)
                    .exec(&self.db)
                    .await?
                    .rows_affected
            }
        };

        tracing::info!(rows_affected, "Patched movies");
        Ok(RowsAffected { rows_affected })
    }

    #[instrument(skip(self))]
    async fn search(&self, query: MovieLookup) -> MovieResult<MovieList> {
        let names = query.search_names()?;
        let literal = self.embed(&names).await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            SEARCH_NEAREST,
            [Value::from(literal), Value::from(self.config.search_limit as i64)],
        );

        let rows = SearchRow::find_by_statement(stmt).all(&self.db).await?;
        debug!(hits = rows.len(), "Similarity search finished");

        let items: Vec<Movie> = rows.into_iter().map(Movie::from).collect();
        Ok(MovieList {
            count: items.len() as u64,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingProvider;
    use crate::filter::{FieldValue, FilterField, MatchMode};
    use crate::models::PatchableColumn;
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{MockDatabase, MockExecResult};
    use std::collections::BTreeMap;

    const DIMENSION: usize = 3;

    fn timestamp() -> sea_orm::prelude::DateTimeWithTimeZone {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 10, 16, 12, 0, 0)
            .unwrap()
    }

    fn model(id: Uuid) -> entity::Model {
        entity::Model {
            id,
            name_uz: "Sarob".to_string(),
            name_ru: "Мираж".to_string(),
            name_en: "Mirage".to_string(),
            created_at: timestamp(),
            updated_at: timestamp(),
        }
    }

    /// Embedder whose provider must be called exactly `calls` times
    fn embedder(calls: usize) -> Arc<MovieEmbedder> {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_dimension().return_const(DIMENSION);
        provider.expect_name().return_const("mock");
        provider
            .expect_embed_batch()
            .times(calls)
            .returning(|texts| Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect()));
        Arc::new(MovieEmbedder::new(Arc::new(provider)))
    }

    fn repository(db: &DatabaseConnection, calls: usize) -> PgMovieRepository {
        PgMovieRepository::new(db.clone(), embedder(calls))
    }

    fn log_of(db: DatabaseConnection) -> String {
        format!("{:?}", db.into_transaction_log())
    }

    #[tokio::test]
    async fn test_create_inserts_vector_literal_in_one_statement() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![model(id)]])
            .into_connection();
        let repo = repository(&db, 1);

        let movie = repo
            .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
            .await
            .unwrap();
        assert_eq!(movie.id, id);
        assert_eq!(movie.distance, None);

        let log = log_of(db);
        assert!(log.contains("$5::vector"), "{}", log);
        assert!(log.contains("[1.000000000,0.000000000,0.000000000]"), "{}", log);
        assert_eq!(log.matches("INSERT INTO movies").count(), 1);
    }

    #[tokio::test]
    async fn test_create_with_blank_names_touches_nothing() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let repo = repository(&db, 0);

        let result = repo.create(CreateMovie::new(" ", "", "")).await;
        assert!(matches!(result, Err(MovieError::Validation(_))));
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_get_single_missing_id_is_not_found() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();
        let repo = repository(&db, 0);

        let result = repo.get_single(MovieLookup::by_id(id)).await;
        assert!(matches!(result, Err(MovieError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_get_single_empty_lookup_is_rejected() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let repo = repository(&db, 0);

        let result = repo.get_single(MovieLookup::default().with_name_en("")).await;
        assert!(matches!(result, Err(MovieError::Validation(_))));
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_get_list_returns_page_and_total() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![model(Uuid::now_v7()), model(Uuid::now_v7())]])
            .append_query_results([vec![BTreeMap::from([("count", Value::BigInt(Some(12)))])]])
            .into_connection();
        let repo = repository(&db, 0);

        let list = repo.get_list(FilterSpec::new().paginate(0, -5)).await.unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.count, 12);

        let log = log_of(db);
        assert!(log.contains("COUNT(*)"), "{}", log);
        assert!(log.contains("LIMIT"), "{}", log);
    }

    #[tokio::test]
    async fn test_update_missing_id_is_not_found() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([Vec::<entity::Model>::new()])
            .into_connection();
        let repo = repository(&db, 0);

        let result = repo.update(UpdateMovie::new(id, "a", "b", "c")).await;
        assert!(matches!(result, Err(MovieError::NotFound(missing)) if missing == id));

        let log = log_of(db);
        assert!(!log.contains("::vector"), "embedding should be preserved: {}", log);
    }

    #[tokio::test]
    async fn test_update_regenerates_when_configured() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![model(id)]])
            .into_connection();
        let repo = PgMovieRepository::with_config(
            db.clone(),
            embedder(1),
            MovieRepositoryConfig::default().with_embedding_refresh(EmbeddingRefresh::Regenerate),
        );

        repo.update(UpdateMovie::new(id, "Sarob", "Мираж", "Mirage"))
            .await
            .unwrap();
        assert!(log_of(db).contains("embedding = $5::vector"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = repository(&db, 0);

        let result = repo.delete(Uuid::now_v7()).await;
        assert!(matches!(result, Err(MovieError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_field_reports_rows_affected() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let repo = repository(&db, 0);

        let filter = FilterSpec::new().with_condition(
            FilterField::NameUz,
            MatchMode::Eq,
            FieldValue::Text("Nothing".into()),
        );
        let result = repo
            .update_field(UpdateFieldRequest::new(filter).set(PatchableColumn::NameEn, "Mirage"))
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 0);

        let log = log_of(db);
        assert!(log.contains("UPDATE"), "{}", log);
        assert!(log.contains("updated_at"), "{}", log);
    }

    #[tokio::test]
    async fn test_update_field_regenerates_each_locked_row() {
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![model(Uuid::now_v7()), model(Uuid::now_v7())]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();
        let repo = PgMovieRepository::with_config(
            db.clone(),
            embedder(2),
            MovieRepositoryConfig::default().with_embedding_refresh(EmbeddingRefresh::Regenerate),
        );

        let filter = FilterSpec::new().with_condition(
            FilterField::NameUz,
            MatchMode::Eq,
            FieldValue::Text("Sarob".into()),
        );
        let result = repo
            .update_field(UpdateFieldRequest::new(filter).set(PatchableColumn::NameUz, "Yulduz"))
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 2);

        let log = log_of(db);
        assert!(log.contains("FOR UPDATE"), "{}", log);
        assert_eq!(log.matches("embedding = $5::vector").count(), 2, "{}", log);
        assert!(log.contains("Yulduz"), "{}", log);
    }

    #[tokio::test]
    async fn test_update_field_without_filter_is_rejected() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let repo = repository(&db, 0);

        let result = repo
            .update_field(UpdateFieldRequest::new(FilterSpec::new()).set(PatchableColumn::NameEn, "x"))
            .await;
        assert!(matches!(result, Err(MovieError::Validation(_))));
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_search_attaches_distance() {
        let id = Uuid::now_v7();
        let row = BTreeMap::from([
            ("id", Value::from(id)),
            ("name_uz", Value::from("Sarob")),
            ("name_ru", Value::from("Мираж")),
            ("name_en", Value::from("Mirage")),
            ("created_at", Value::from(timestamp())),
            ("updated_at", Value::from(timestamp())),
            ("distance", Value::Double(Some(0.0))),
        ]);
        let db = MockDatabase::new(DbBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();
        let repo = repository(&db, 1);

        let hits = repo
            .search(MovieLookup::default().with_name_uz("Sarob"))
            .await
            .unwrap();
        assert_eq!(hits.count, 1);
        assert_eq!(hits.items[0].id, id);
        assert_eq!(hits.items[0].distance, Some(0.0));

        let log = log_of(db);
        assert!(log.contains("<->"), "{}", log);
        assert!(log.contains("BigInt(Some(10))"), "{}", log);
    }

    #[tokio::test]
    async fn test_search_with_id_is_rejected() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let repo = repository(&db, 0);

        let result = repo
            .search(MovieLookup::by_id(Uuid::now_v7()).with_name_en("Mirage"))
            .await;
        assert!(matches!(result, Err(MovieError::Validation(_))));
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_search_with_blank_text_is_rejected() {
        let db = MockDatabase::new(DbBackend::Postgres).into_connection();
        let repo = repository(&db, 0);

        let result = repo.search(MovieLookup::text("")).await;
        assert!(matches!(result, Err(MovieError::Validation(_))));
        assert!(db.into_transaction_log().is_empty());
    }
}
