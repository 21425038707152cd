//! Utilities shared by the connector and by callers of remote services

pub mod error;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use retry::{
    RetryConfig, retry, retry_with_backoff, retry_with_backoff_hinted, retry_with_backoff_if,
};
