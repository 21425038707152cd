use sea_orm_migration::{prelude::*, schema::*};

/// Dimension of the `embedding` column. Must match `EMBEDDING_DIMENSION`
/// (text-embedding-ada-002 / text-embedding-3-small produce 1536 values).
pub const MOVIE_EMBEDDING_DIMENSION: u32 = 1536;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_uuid(Movies::Id))
                    .col(text(Movies::NameUz).default(""))
                    .col(text(Movies::NameRu).default(""))
                    .col(text(Movies::NameEn).default(""))
                    .col(
                        timestamp_with_time_zone(Movies::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Movies::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // sea-query has no pgvector column type
        manager
            .get_connection()
            .execute_unprepared(&format!(
                "ALTER TABLE movies ADD COLUMN IF NOT EXISTS embedding vector({}) NOT NULL",
                MOVIE_EMBEDDING_DIMENSION
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_movies_created_at")
                    .table(Movies::Table)
                    .col(Movies::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // `<->` (L2) is the operator used by nearest-neighbour search
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE INDEX IF NOT EXISTS idx_movies_embedding_hnsw \
                 ON movies USING hnsw (embedding vector_l2_ops)",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Movies::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    NameUz,
    NameRu,
    NameEn,
    CreatedAt,
    UpdatedAt,
}
