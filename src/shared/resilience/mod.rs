pub mod batch;
pub mod circuit_breaker;
pub mod policies;
pub mod retry;

pub use batch::{batch_retry, BatchOutcome};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use policies::{retry_database_operation, retry_file_upload, retry_with_rate_limit};
pub use retry::{compute_delay, retry_with_backoff, RetryHook, RetryOptions, RetryPredicate};
