//! Integration tests for the Movies domain
//!
//! These tests use real PostgreSQL with pgvector via testcontainers to ensure:
//! - Vector literals round-trip through the `::vector` cast
//! - Filters, ordering and pagination produce the expected pages
//! - Similarity search ranks by Euclidean distance
//! - Bulk updates report the rows they touched

use std::sync::Arc;

use domain_movies::config::DEFAULT_EMBEDDING_DIMENSION;
use domain_movies::*;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};
use uuid::Uuid;

fn embedder() -> Arc<MovieEmbedder> {
    let provider = HashingProvider::new(DEFAULT_EMBEDDING_DIMENSION);
    Arc::new(MovieEmbedder::new(Arc::new(provider)))
}

fn repository(db: &TestDatabase) -> PgMovieRepository {
    PgMovieRepository::new(db.connection(), embedder())
}

async fn seed(repo: &PgMovieRepository, builder: &TestDataBuilder, count: usize) -> Vec<Movie> {
    let mut created = Vec::with_capacity(count);
    for i in 0..count {
        let suffix = i.to_string();
        let movie = repo
            .create(CreateMovie::new(
                builder.name("uz", &suffix),
                builder.name("ru", &suffix),
                builder.name("en", &suffix),
            ))
            .await
            .unwrap();
        created.push(movie);
    }
    created
}

// ============================================================================
// Create / Get
// ============================================================================

#[tokio::test]
async fn test_create_and_get_movie() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    let created = repo
        .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    assert_eq!(created.name_uz, "Sarob");
    assert_eq!(created.name_ru, "Мираж");
    assert_eq!(created.name_en, "Mirage");
    assert_eq!(created.created_at, created.updated_at);
    assert_eq!(created.distance, None);

    let by_id = repo.get_single(MovieLookup::by_id(created.id)).await.unwrap();
    assert_uuid_eq(by_id.id, created.id, "lookup by id");

    let by_name = repo
        .get_single(MovieLookup::default().with_name_en("mirage"))
        .await
        .unwrap();
    assert_uuid_eq(by_name.id, created.id, "lookup by English name ignores case");
}

#[tokio::test]
async fn test_get_single_misses() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);
    let builder = TestDataBuilder::from_test_name("get_single_misses");

    let missing = builder.movie_id();
    let result = repo.get_single(MovieLookup::by_id(missing)).await;
    assert!(matches!(result, Err(MovieError::NotFound(id)) if id == missing));

    let result = repo
        .get_single(MovieLookup::default().with_name_ru("Нет такого"))
        .await;
    assert!(matches!(result, Err(MovieError::NoMatch)));
}

#[tokio::test]
async fn test_like_wildcards_in_names_are_literal() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    repo.create(CreateMovie::new("", "", "Mirage")).await.unwrap();

    let result = repo
        .get_single(MovieLookup::default().with_name_en("Mir%"))
        .await;
    assert!(matches!(result, Err(MovieError::NoMatch)));
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_defaults_to_first_ten_newest_first() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);
    let builder = TestDataBuilder::from_test_name("list_defaults");

    let created = seed(&repo, &builder, 12).await;

    let first = repo.get_list(FilterSpec::new().paginate(0, 0)).await.unwrap();
    assert_eq!(first.count, 12);
    assert_eq!(first.items.len(), 10);

    let newest: Vec<Uuid> = created.iter().rev().take(10).map(|m| m.id).collect();
    let listed: Vec<Uuid> = first.items.iter().map(|m| m.id).collect();
    assert_id_order(&listed, &newest, "default ordering");

    let second = repo.get_list(FilterSpec::new().paginate(2, 10)).await.unwrap();
    assert_eq!(second.count, 12);
    assert_eq!(second.items.len(), 2);
}

#[tokio::test]
async fn test_list_filters_and_orders() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    for (uz, en) in [("Sarob", "Mirage"), ("Qum", "Dune"), ("Yulduz", "Star Mirage")] {
        repo.create(CreateMovie::new(uz, "", en)).await.unwrap();
    }

    let filter = FilterSpec::new()
        .with_condition(
            FilterField::NameEn,
            MatchMode::Contains,
            FieldValue::Text("mirage".into()),
        )
        .with_order(OrderBy::asc(FilterField::NameUz));

    let list = repo.get_list(filter).await.unwrap();
    assert_eq!(list.count, 2);
    let names: Vec<&str> = list.items.iter().map(|m| m.name_uz.as_str()).collect();
    assert_eq!(names, vec!["Sarob", "Yulduz"]);

    let either = FilterSpec::new().with_group(FilterGroup::any(vec![
        FilterCondition::new(FilterField::NameUz, MatchMode::Eq, FieldValue::Text("Qum".into())),
        FilterCondition::new(FilterField::NameEn, MatchMode::Eq, FieldValue::Text("Mirage".into())),
    ]));
    assert_eq!(repo.get_list(either).await.unwrap().count, 2);
}

#[tokio::test]
async fn test_snapshot_list_matches_independent_list() {
    let db = TestDatabase::new().await;
    let builder = TestDataBuilder::from_test_name("snapshot_list");

    let repo = PgMovieRepository::with_config(
        db.connection(),
        embedder(),
        MovieRepositoryConfig::default().with_list_consistency(ListConsistency::Snapshot),
    );
    seed(&repo, &builder, 3).await;

    let snapshot = repo.get_list(FilterSpec::new()).await.unwrap();
    let independent = repository(&db).get_list(FilterSpec::new()).await.unwrap();
    assert_eq!(snapshot, independent);
    assert_eq!(snapshot.count, 3);
}

// ============================================================================
// Update / Delete
// ============================================================================

#[tokio::test]
async fn test_update_replaces_names() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);
    let builder = TestDataBuilder::from_test_name("update_replaces");

    let created = repo
        .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    let updated = repo
        .update(UpdateMovie::new(created.id, "Sarob 2", "Мираж 2", "Mirage 2"))
        .await
        .unwrap();
    assert_eq!(updated.name_en, "Mirage 2");
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    let missing = builder.movie_id();
    let result = repo.update(UpdateMovie::new(missing, "a", "b", "c")).await;
    assert!(matches!(result, Err(MovieError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn test_update_field_counts_rows() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    for uz in ["Sarob", "Sarob", "Qum"] {
        repo.create(CreateMovie::new(uz, "", "")).await.unwrap();
    }

    let none = UpdateFieldRequest::new(FilterSpec::new().with_condition(
        FilterField::NameUz,
        MatchMode::Eq,
        FieldValue::Text("Nothing".into()),
    ))
    .set(PatchableColumn::NameEn, "Mirage");
    assert_eq!(repo.update_field(none).await.unwrap().rows_affected, 0);

    let two = UpdateFieldRequest::new(FilterSpec::new().with_condition(
        FilterField::NameUz,
        MatchMode::Eq,
        FieldValue::Text("Sarob".into()),
    ))
    .set(PatchableColumn::NameEn, "Mirage");
    assert_eq!(repo.update_field(two).await.unwrap().rows_affected, 2);

    let patched = repo
        .get_list(FilterSpec::new().with_condition(
            FilterField::NameEn,
            MatchMode::Eq,
            FieldValue::Text("Mirage".into()),
        ))
        .await
        .unwrap();
    assert_eq!(patched.count, 2);
    assert!(patched.items.iter().all(|m| m.name_uz == "Sarob"));
}

#[tokio::test]
async fn test_delete_removes_movie() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    let created = repo
        .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    repo.delete(created.id).await.unwrap();

    let result = repo.get_single(MovieLookup::by_id(created.id)).await;
    assert!(matches!(result, Err(MovieError::NotFound(_))));

    let result = repo.delete(created.id).await;
    assert!(matches!(result, Err(MovieError::NotFound(_))));
}

// ============================================================================
// Similarity search
// ============================================================================

#[tokio::test]
async fn test_search_ranks_by_distance() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);
    let builder = TestDataBuilder::from_test_name("search_ranks");

    seed(&repo, &builder, 11).await;
    let mirage = repo
        .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    let hits = repo
        .search(
            MovieLookup::default()
                .with_name_uz("Sarob")
                .with_name_ru("Мираж")
                .with_name_en("Mirage"),
        )
        .await
        .unwrap();

    assert_eq!(hits.items.len(), 10);
    assert_eq!(hits.count, 10);
    assert_uuid_eq(hits.items[0].id, mirage.id, "exact names rank first");

    let distances: Vec<f64> = hits
        .items
        .iter()
        .map(|m| assert_some(m.distance, "search hits carry a distance"))
        .collect();
    assert!(distances[0] < 1e-4, "distance was {}", distances[0]);
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_search_follows_regenerated_embedding() {
    let db = TestDatabase::new().await;
    let repo = PgMovieRepository::with_config(
        db.connection(),
        embedder(),
        MovieRepositoryConfig::default().with_embedding_refresh(EmbeddingRefresh::Regenerate),
    );

    let movie = repo
        .create(CreateMovie::new("Qum", "Дюна", "Dune"))
        .await
        .unwrap();
    repo.create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    repo.update(UpdateMovie::new(movie.id, "Yulduz", "Звезда", "Star"))
        .await
        .unwrap();

    let hits = repo
        .search(
            MovieLookup::default()
                .with_name_uz("Yulduz")
                .with_name_ru("Звезда")
                .with_name_en("Star"),
        )
        .await
        .unwrap();
    assert_uuid_eq(hits.items[0].id, movie.id, "regenerated vector is searchable");
    assert!(assert_some(hits.items[0].distance, "distance") < 1e-4);
}

#[tokio::test]
async fn test_search_empty_table() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    let hits = repo.search(MovieLookup::text("Mirage")).await.unwrap();
    assert!(hits.items.is_empty());
    assert_eq!(hits.count, 0);
}

#[tokio::test]
async fn test_search_by_one_name_finds_only_movie() {
    let db = TestDatabase::new().await;
    let repo = repository(&db);

    let created = repo
        .create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    let hits = repo
        .search(MovieLookup::default().with_name_uz("Sarob"))
        .await
        .unwrap();
    assert_eq!(hits.count, 1);
    assert_uuid_eq(hits.items[0].id, created.id, "only movie is the nearest");
    let distance = assert_some(hits.items[0].distance, "distance");
    assert!(distance < 1e-4, "distance was {}", distance);
}

#[tokio::test]
async fn test_search_follows_bulk_patched_embedding() {
    let db = TestDatabase::new().await;
    let repo = PgMovieRepository::with_config(
        db.connection(),
        embedder(),
        MovieRepositoryConfig::default().with_embedding_refresh(EmbeddingRefresh::Regenerate),
    );

    let dune = repo
        .create(CreateMovie::new("Qum", "Дюна", "Dune"))
        .await
        .unwrap();
    repo.create(CreateMovie::new("Sarob", "Мираж", "Mirage"))
        .await
        .unwrap();

    let filter = FilterSpec::new().with_condition(
        FilterField::NameEn,
        MatchMode::Eq,
        FieldValue::Text("Dune".into()),
    );
    let result = repo
        .update_field(UpdateFieldRequest::new(filter).set(PatchableColumn::NameUz, "Yulduz"))
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    let hits = repo
        .search(MovieLookup::default().with_name_uz("Yulduz"))
        .await
        .unwrap();
    assert_uuid_eq(hits.items[0].id, dune.id, "patched row is the nearest");
    let distance = assert_some(hits.items[0].distance, "distance");
    assert!(distance < 1e-4, "distance was {}", distance);
    assert_eq!(hits.items[0].name_uz, "Yulduz");
}
