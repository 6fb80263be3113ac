//! Domain-tuned retry policies layered on [`retry_with_backoff`].
//!
//! Each wrapper differs only in its parameters and in which error classes it
//! treats as transient.

use super::retry::{retry_with_backoff, RetryOptions};
use crate::domain::errors::{ServiceError, ServiceResult};
use std::future::Future;
use std::time::Duration;

/// Attempts after which the rate-limit policy gives up on non-429 errors
const RATE_LIMIT_OTHER_ERROR_ATTEMPTS: u32 = 3;

/// Database calls: network, 429 and 5xx are transient; constraint,
/// permission and row-level security failures are permanent.
pub fn should_retry_database(error: &ServiceError, _attempt: u32) -> bool {
    match error {
        ServiceError::Network { .. }
        | ServiceError::RateLimited { .. }
        | ServiceError::Server { .. } => true,
        ServiceError::Validation { .. }
        | ServiceError::Permission { .. }
        | ServiceError::Client { .. }
        | ServiceError::CircuitOpen { .. }
        | ServiceError::Aborted => false,
    }
}

/// File uploads: network failures and 5xx are transient; size and type
/// rejections can never succeed on retry.
pub fn should_retry_upload(error: &ServiceError, _attempt: u32) -> bool {
    match error {
        ServiceError::Network { .. } | ServiceError::Server { .. } => true,
        ServiceError::Validation { .. }
        | ServiceError::Permission { .. }
        | ServiceError::RateLimited { .. }
        | ServiceError::Client { .. }
        | ServiceError::CircuitOpen { .. }
        | ServiceError::Aborted => false,
    }
}

/// Rate-limited APIs: 429 is always retried; other errors stop after three
/// attempts and only 5xx is retried before that.
pub fn should_retry_rate_limited(error: &ServiceError, attempt: u32) -> bool {
    if matches!(error, ServiceError::RateLimited { .. }) {
        return true;
    }
    if attempt + 1 >= RATE_LIMIT_OTHER_ERROR_ATTEMPTS {
        return false;
    }
    matches!(error, ServiceError::Server { .. })
}

pub fn database_options(operation_name: &str) -> RetryOptions {
    let name = operation_name.to_string();

    RetryOptions::default()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(1000))
        .with_should_retry(should_retry_database)
        .with_on_retry(move |error, attempt| {
            record_retry("database", &name, error, attempt);
        })
}

pub fn upload_options(file_name: &str) -> RetryOptions {
    let name = file_name.to_string();

    RetryOptions::default()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(2000))
        .with_max_delay(Duration::from_millis(60_000))
        .with_should_retry(should_retry_upload)
        .with_on_retry(move |error, attempt| {
            record_retry("file_upload", &name, error, attempt);
        })
}

pub fn rate_limit_options(endpoint: &str) -> RetryOptions {
    let name = endpoint.to_string();

    RetryOptions::default()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(5000))
        .with_backoff_multiplier(3.0)
        .with_should_retry(should_retry_rate_limited)
        .with_on_retry(move |error, attempt| {
            record_retry("rate_limited", &name, error, attempt);
        })
}

/// Retry a database operation (query, insert, update, RPC)
pub async fn retry_database_operation<T, F, Fut>(operation: F, operation_name: &str) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    retry_with_backoff(operation, database_options(operation_name)).await
}

/// Retry a storage upload
pub async fn retry_file_upload<T, F, Fut>(operation: F, file_name: &str) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    retry_with_backoff(operation, upload_options(file_name)).await
}

/// Retry a call to an API that answers with 429 when overloaded
pub async fn retry_with_rate_limit<T, F, Fut>(operation: F, endpoint: &str) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    retry_with_backoff(operation, rate_limit_options(endpoint)).await
}

fn record_retry(policy: &'static str, name: &str, error: &ServiceError, attempt: u32) {
    tracing::warn!(
        policy,
        operation = name,
        attempt,
        "Retrying {} (attempt {}): {}",
        name,
        attempt,
        error
    );
    metrics::counter!("estatedesk_policy_retries_total", "policy" => policy).increment(1);
}
