use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use std::time::Instant;
use tracing::debug;

use crate::common::DatabaseError;

/// Run `SELECT 1` to verify the pool can reach the database.
pub async fn check_health(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    debug!("Running PostgreSQL health check");

    let stmt = Statement::from_string(DatabaseBackend::Postgres, "SELECT 1".to_owned());
    db.query_one_raw(stmt).await.map_err(|e| {
        DatabaseError::HealthCheckFailed(format!("PostgreSQL health check failed: {}", e))
    })?;

    Ok(())
}

/// Verify that the pgvector extension is installed in the connected database.
///
/// The movie table stores its embeddings in a `vector` column, so a database
/// without the extension cannot serve any write or search.
pub async fn check_vector_extension(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(
        DatabaseBackend::Postgres,
        "SELECT extversion FROM pg_extension WHERE extname = 'vector'".to_owned(),
    );

    let row = db.query_one_raw(stmt).await.map_err(|e| {
        DatabaseError::HealthCheckFailed(format!("pgvector extension check failed: {}", e))
    })?;

    match row {
        Some(row) => {
            let version: String = row.try_get("", "extversion")?;
            debug!(version = %version, "pgvector extension present");
            Ok(())
        }
        None => Err(DatabaseError::ExtensionMissing("vector".to_string())),
    }
}

/// Result of [`check_health_detailed`]
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: u64,
}

impl HealthStatus {
    pub fn healthy(response_time_ms: u64) -> Self {
        Self {
            healthy: true,
            message: None,
            response_time_ms,
        }
    }

    pub fn unhealthy(message: String, response_time_ms: u64) -> Self {
        Self {
            healthy: false,
            message: Some(message),
            response_time_ms,
        }
    }
}

/// Connectivity plus pgvector check, with timing, for readiness checks.
pub async fn check_health_detailed(db: &DatabaseConnection) -> HealthStatus {
    let start = Instant::now();

    let result = match check_health(db).await {
        Ok(()) => check_vector_extension(db).await,
        Err(e) => Err(e),
    };

    let elapsed = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => HealthStatus::healthy(elapsed),
        Err(e) => HealthStatus::unhealthy(e.to_string(), elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{MockDatabase, Value};
    use std::collections::BTreeMap;

    #[test]
    fn test_health_status_unhealthy() {
        let status = HealthStatus::unhealthy("connection failed".to_string(), 100);
        assert!(!status.healthy);
        assert_eq!(status.response_time_ms, 100);
        assert_eq!(status.message.as_deref(), Some("connection failed"));
    }

    #[tokio::test]
    async fn test_check_vector_extension_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<BTreeMap<&str, Value>>::new()])
            .into_connection();

        let result = check_vector_extension(&db).await;
        assert!(matches!(result, Err(DatabaseError::ExtensionMissing(ref ext)) if ext == "vector"));
    }

    #[tokio::test]
    async fn test_check_vector_extension_present() {
        let row = BTreeMap::from([("extversion", Value::from("0.8.0"))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        assert!(check_vector_extension(&db).await.is_ok());
    }
}
