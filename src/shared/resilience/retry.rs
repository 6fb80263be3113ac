use crate::domain::errors::{ServiceError, ServiceResult};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Decides whether a failed attempt (0-based index) may be retried
pub type RetryPredicate = Arc<dyn Fn(&ServiceError, u32) -> bool + Send + Sync>;

/// Called before sleeping, with the 1-based number of the retry about to happen
pub type RetryHook = Arc<dyn Fn(&ServiceError, u32) + Send + Sync>;

/// Maximum share of a delay added or removed by jitter
const JITTER_RATIO: f64 = 0.25;

/// Retry configuration for a single call of [`retry_with_backoff`]
#[derive(Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub should_retry: RetryPredicate,
    pub on_retry: RetryHook,
    /// Checked before every attempt and raced against every backoff sleep
    pub cancellation: Option<CancellationToken>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
            should_retry: Arc::new(|error: &ServiceError, _attempt: u32| {
                error.is_retryable_by_default()
            }),
            on_retry: Arc::new(|_: &ServiceError, _: u32| {}),
            cancellation: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("cancellable", &self.cancellation.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_should_retry<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ServiceError, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Arc::new(predicate);
        self
    }

    pub fn with_on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&ServiceError, u32) + Send + Sync + 'static,
    {
        self.on_retry = Arc::new(hook);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// Delay before the retry that follows the failed attempt `attempt` (0-based).
///
/// `min(base * multiplier^attempt, max)`, then shifted by up to ±25% when
/// jitter is enabled and floored to whole milliseconds.
pub fn compute_delay(options: &RetryOptions, attempt: u32) -> Duration {
    let base_ms = options.base_delay.as_secs_f64() * 1000.0;
    let max_ms = options.max_delay.as_secs_f64() * 1000.0;
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);

    let mut delay_ms = (base_ms * options.backoff_multiplier.powi(exponent)).min(max_ms);

    if options.jitter {
        let offset = rand::thread_rng().gen_range(-JITTER_RATIO..=JITTER_RATIO);
        delay_ms += delay_ms * offset;
    }

    Duration::from_millis(delay_ms.max(0.0).floor() as u64)
}

/// Run `operation` until it succeeds, the classifier refuses a retry, or
/// `max_attempts` attempts have been made.
///
/// The error of the last attempt is returned unchanged. No delay follows the
/// final attempt. Cancellation yields [`ServiceError::Aborted`].
pub async fn retry_with_backoff<T, F, Fut>(mut operation: F, options: RetryOptions) -> ServiceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ServiceResult<T>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if options.is_cancelled() {
            return Err(ServiceError::Aborted);
        }

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let is_last_attempt = attempt + 1 >= max_attempts;
        if is_last_attempt || !(options.should_retry)(&error, attempt) {
            return Err(error);
        }

        (options.on_retry)(&error, attempt + 1);

        let delay = compute_delay(&options, attempt);
        metrics::counter!("estatedesk_retries_total").increment(1);
        tracing::debug!(
            "Attempt {} of {} failed ({}), retrying in {:?}",
            attempt + 1,
            max_attempts,
            error,
            delay
        );

        match &options.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => return Err(ServiceError::Aborted),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }

        attempt += 1;
    }
}
