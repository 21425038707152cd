//! PostgreSQL plumbing for the movie workspace.
//!
//! Connection pool setup, migration running, health checks (including the
//! pgvector extension) and a retry helper with exponential backoff that the
//! embedding client reuses for transient provider failures.
//!
//! # Example
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{self, PostgresConfig};
//! use migration::Migrator;
//!
//! let config = PostgresConfig::from_env()?;
//! let db = postgres::connect_from_config_with_retry(config, None).await?;
//! postgres::run_migrations::<Migrator>(&db, "movies").await?;
//! postgres::check_vector_extension(&db).await?;
//! ```

pub mod common;
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult, RetryConfig};
