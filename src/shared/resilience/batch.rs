use super::retry::{retry_with_backoff, RetryOptions};
use crate::domain::errors::{ServiceError, ServiceResult};
use futures::future::join_all;
use std::future::Future;

/// Outcome of one operation in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    pub success: bool,
    pub result: Option<T>,
    pub error: Option<ServiceError>,
}

impl<T> BatchOutcome<T> {
    pub fn into_result(self) -> ServiceResult<T> {
        match (self.result, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ServiceError::Aborted),
        }
    }
}

impl<T> From<ServiceResult<T>> for BatchOutcome<T> {
    fn from(result: ServiceResult<T>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                result: Some(value),
                error: None,
            },
            Err(error) => Self {
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

/// Run every operation concurrently, each under its own retry loop with the
/// same options.
///
/// One operation exhausting its retries never aborts the others. The output
/// has one outcome per input, in input order.
pub async fn batch_retry<T, F, Fut>(operations: Vec<F>, options: RetryOptions) -> Vec<BatchOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let total = operations.len();

    let outcomes: Vec<BatchOutcome<T>> = join_all(
        operations
            .into_iter()
            .map(|operation| retry_with_backoff(operation, options.clone())),
    )
    .await
    .into_iter()
    .map(BatchOutcome::from)
    .collect();

    let failed = outcomes.iter().filter(|outcome| !outcome.success).count();
    if failed > 0 {
        tracing::warn!("Batch finished with {} of {} operations failed", failed, total);
    }

    outcomes
}
