/// Error type for connection, health and migration operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    /// Connection failed after retries
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// A required extension (pgvector) is not installed in the target database
    #[error("Extension '{0}' is not installed")]
    ExtensionMissing(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] core_config::ConfigError),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
