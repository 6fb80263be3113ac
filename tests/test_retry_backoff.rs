mod helpers;

use estatedesk::shared::resilience::{
    batch_retry, retry_database_operation, retry_file_upload, retry_with_backoff,
    retry_with_rate_limit, RetryOptions,
};
use estatedesk::{ServiceError, ServiceResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use helpers::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

fn fast_options(max_attempts: u32) -> RetryOptions {
    RetryOptions::default()
        .with_max_attempts(max_attempts)
        .with_base_delay(Duration::from_millis(100))
        .with_jitter(false)
}

fn assert_close(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(5),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_runs_exactly_max_attempts() {
    for max_attempts in 1..=5 {
        let calls = CallCounter::new();

        let result: ServiceResult<()> = retry_with_backoff(
            || {
                let call = calls.hit();
                async move { Err(network_error(call)) }
            },
            fast_options(max_attempts),
        )
        .await;

        assert_eq!(calls.count(), max_attempts);
        // The last attempt's error comes back untouched
        assert_eq!(result, Err(network_error(max_attempts)));
    }
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_fails_after_one_call() {
    let calls = CallCounter::new();

    let result: ServiceResult<()> = retry_with_backoff(
        || {
            calls.hit();
            async { Err(ServiceError::from_status(404, "property not found")) }
        },
        fast_options(5),
    )
    .await;

    assert_eq!(calls.count(), 1);
    assert_eq!(
        result,
        Err(ServiceError::Client {
            status: 404,
            message: "property not found".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_two_network_failures() {
    let calls = CallCounter::new();
    let call_times = Arc::new(Mutex::new(Vec::new()));
    let retries = Arc::new(Mutex::new(Vec::new()));

    let retries_hook = retries.clone();
    let options = fast_options(3).with_on_retry(move |_, attempt| {
        retries_hook.lock().unwrap().push(attempt);
    });

    let result = retry_with_backoff(
        || {
            let call = calls.hit();
            call_times.lock().unwrap().push(Instant::now());
            async move {
                if call <= 2 {
                    Err(network_error(call))
                } else {
                    Ok("lease signed")
                }
            }
        },
        options,
    )
    .await;

    assert_eq!(result, Ok("lease signed"));
    assert_eq!(calls.count(), 3);
    assert_eq!(*retries.lock().unwrap(), vec![1, 2]);

    let times = call_times.lock().unwrap();
    assert_close(times[1] - times[0], 100);
    assert_close(times[2] - times[1], 200);
}

#[tokio::test(start_paused = true)]
async fn test_no_delay_after_final_attempt() {
    let start = Instant::now();

    let result: ServiceResult<()> =
        retry_with_backoff(|| async { Err(ServiceError::network("offline")) }, fast_options(3)).await;

    assert_err!(result);
    // 100ms + 200ms between the three attempts, nothing after the last
    assert_close(start.elapsed(), 300);
}

#[tokio::test(start_paused = true)]
async fn test_should_retry_receives_zero_based_attempt() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_hook = seen.clone();

    let options = fast_options(4).with_should_retry(move |_, attempt| {
        seen_hook.lock().unwrap().push(attempt);
        true
    });

    let result: ServiceResult<()> =
        retry_with_backoff(|| async { Err(ServiceError::network("flaky")) }, options).await;

    assert_err!(result);
    // Not consulted after the final attempt
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_backoff_aborts() {
    let calls = CallCounter::new();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let options = fast_options(5)
        .with_base_delay(Duration::from_secs(10))
        .with_cancellation(token);

    let result: ServiceResult<()> = retry_with_backoff(
        || {
            calls.hit();
            async { Err(ServiceError::network("offline")) }
        },
        options,
    )
    .await;

    assert_eq!(result, Err(ServiceError::Aborted));
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_token_prevents_first_attempt() {
    let calls = CallCounter::new();
    let token = CancellationToken::new();
    token.cancel();

    let result: ServiceResult<()> = retry_with_backoff(
        || {
            calls.hit();
            async { Ok(()) }
        },
        fast_options(3).with_cancellation(token),
    )
    .await;

    assert_eq!(result, Err(ServiceError::Aborted));
    assert_eq!(calls.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_database_policy_stops_on_constraint_violation() {
    let calls = CallCounter::new();

    let result: ServiceResult<()> = retry_database_operation(
        || {
            calls.hit();
            async {
                Err(ServiceError::from_postgrest(
                    Some(409),
                    Some("23505"),
                    "duplicate key value violates unique constraint \"tenants_email_key\"",
                ))
            }
        },
        "create_tenant",
    )
    .await;

    assert!(matches!(result, Err(ServiceError::Validation { .. })));
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_database_policy_retries_server_errors() {
    let calls = CallCounter::new();

    let result = retry_database_operation(
        || {
            let call = calls.hit();
            async move {
                if call == 1 {
                    Err(ServiceError::from_status(503, "upstream unavailable"))
                } else {
                    Ok(vec!["unit-1", "unit-2"])
                }
            }
        },
        "list_units",
    )
    .await;

    assert_ok!(result);
    assert_eq!(calls.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_upload_policy_skips_validation_failures() {
    let calls = CallCounter::new();

    let result: ServiceResult<()> = retry_file_upload(
        || {
            calls.hit();
            async { Err(ServiceError::from_upload_failure(Some(413), "Payload too large")) }
        },
        "inspection-photos.zip",
    )
    .await;

    assert_err!(result);
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_policy_retries_network_up_to_five_times() {
    let calls = CallCounter::new();

    let result: ServiceResult<()> = retry_file_upload(
        || {
            let call = calls.hit();
            async move { Err(network_error(call)) }
        },
        "lease.pdf",
    )
    .await;

    assert_eq!(result, Err(network_error(5)));
    assert_eq!(calls.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_policy_retries_429_to_max_attempts() {
    let calls = CallCounter::new();
    let start = Instant::now();

    let result: ServiceResult<()> = retry_with_rate_limit(
        || {
            calls.hit();
            async { Err(ServiceError::from_status(429, "Too Many Requests")) }
        },
        "send-rent-reminder",
    )
    .await;

    assert!(matches!(result, Err(ServiceError::RateLimited { .. })));
    assert_eq!(calls.count(), 5);
    // Jittered 5s, 15s, 30s (capped), 30s: at least 75% of 80s
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_policy_gives_up_on_server_errors_after_three_attempts() {
    let calls = CallCounter::new();

    let result: ServiceResult<()> = retry_with_rate_limit(
        || {
            calls.hit();
            async { Err(ServiceError::from_status(502, "Bad Gateway")) }
        },
        "send-rent-reminder",
    )
    .await;

    assert_err!(result);
    assert_eq!(calls.count(), 3);
}

type BoxedOperation = Box<dyn FnMut() -> BoxFuture<'static, ServiceResult<u32>> + Send>;

#[tokio::test(start_paused = true)]
async fn test_batch_retry_preserves_order_and_isolates_failures() {
    let failing_calls = CallCounter::new();
    let counter = failing_calls.clone();

    let operations: Vec<BoxedOperation> = vec![
        Box::new(|| {
            async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<u32, ServiceError>(1)
            }
            .boxed()
        }),
        Box::new(move || {
            counter.hit();
            async { Err::<u32, _>(ServiceError::network("vendor API down")) }.boxed()
        }),
        Box::new(|| async { Ok::<u32, ServiceError>(3) }.boxed()),
    ];

    let outcomes = batch_retry(operations, fast_options(3)).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].success);
    assert_eq!(outcomes[0].result, Some(1));
    assert!(!outcomes[1].success);
    assert_eq!(outcomes[1].error, Some(ServiceError::network("vendor API down")));
    assert!(outcomes[2].success);
    assert_eq!(outcomes[2].result, Some(3));
    assert_eq!(failing_calls.count(), 3);
}
