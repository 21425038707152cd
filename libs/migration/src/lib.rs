pub use sea_orm_migration::prelude::*;

mod m20251016_000000_enable_pgvector;
mod m20251016_000001_create_movies;

pub use m20251016_000001_create_movies::MOVIE_EMBEDDING_DIMENSION;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251016_000000_enable_pgvector::Migration),
            Box::new(m20251016_000001_create_movies::Migration),
        ]
    }
}
