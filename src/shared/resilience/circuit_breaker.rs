//! Circuit breaker guarding a single downstream dependency.
//!
//! ```text
//! Closed    -> Open:      failure_count >= failure_threshold
//! Open      -> HalfOpen:  reset_timeout elapsed since the last failure
//! HalfOpen  -> Closed:    trial succeeds (failure_count reset)
//! HalfOpen  -> Open:      trial fails
//! ```
//!
//! One breaker per dependency. Share it through [`CircuitBreakerRegistry`]
//! instead of creating one per call.

use crate::domain::errors::{ServiceError, ServiceResult};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_in_flight: bool,
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

/// Admission ticket for one protected call
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        // A trial cancelled mid-flight frees the slot without a verdict
        if self.trial && !self.settled {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Breaker with the default threshold (5) and reset timeout (60 s)
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails fast with [`ServiceError::CircuitOpen`] without calling
    /// `operation` while the breaker is open, or while another half-open
    /// trial is in flight.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let mut admission = self.admit()?;

        let result = operation().await;

        admission.settled = true;
        match &result {
            Ok(_) => self.on_success(admission.trial),
            Err(error) => self.on_failure(admission.trial, error),
        }

        result
    }

    /// Force the breaker closed and clear its counters
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.last_failure_time = None;
        inner.trial_in_flight = false;
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn admit(&self) -> ServiceResult<Admission<'_>> {
        let mut inner = self.lock();

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|at| at.elapsed())
                    .unwrap_or(self.reset_timeout);

                if elapsed < self.reset_timeout {
                    return Err(self.open_error());
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.open_error());
                }
                inner.trial_in_flight = true;
                true
            }
        };

        Ok(Admission {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();

        if trial {
            inner.trial_in_flight = false;
            inner.failure_count = 0;
            self.transition(&mut inner, CircuitState::Closed);
        } else if inner.state == CircuitState::Closed {
            inner.failure_count = 0;
        }
    }

    fn on_failure(&self, trial: bool, error: &ServiceError) {
        let mut inner = self.lock();

        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        if trial {
            inner.trial_in_flight = false;
            tracing::warn!("Circuit {} trial failed: {}", self.name, error);
            self.transition(&mut inner, CircuitState::Open);
        } else if inner.state == CircuitState::Closed
            && inner.failure_count >= self.failure_threshold
        {
            tracing::warn!(
                "Circuit {} tripped after {} failures: {}",
                self.name,
                inner.failure_count,
                error
            );
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, next: CircuitState) {
        if inner.state == next {
            return;
        }

        tracing::info!("Circuit {}: {} -> {}", self.name, inner.state, next);
        inner.state = next;
        metrics::gauge!("estatedesk_circuit_state", "dependency" => self.name.clone())
            .set(next.gauge_value());
    }

    fn open_error(&self) -> ServiceError {
        ServiceError::CircuitOpen {
            dependency: self.name.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("failure_threshold", &self.failure_threshold)
            .field("reset_timeout", &self.reset_timeout)
            .finish()
    }
}

/// Hands out exactly one breaker per logical dependency
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    breakers: Arc<RwLock<HashMap<String, Arc<CircuitBreaker>>>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            breakers: Arc::new(RwLock::new(HashMap::new())),
            failure_threshold,
            reset_timeout,
        }
    }

    /// Get the breaker for a dependency, creating it on first use
    pub async fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().await.get(dependency) {
            return existing.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    dependency,
                    self.failure_threshold,
                    self.reset_timeout,
                ))
            })
            .clone()
    }

    /// Snapshot of every breaker's state, keyed by dependency
    pub async fn states(&self) -> HashMap<String, CircuitState> {
        let breakers = self.breakers.read().await;
        breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }

    pub async fn reset_all(&self) {
        let breakers = self.breakers.read().await;
        for breaker in breakers.values() {
            breaker.reset();
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }
}
