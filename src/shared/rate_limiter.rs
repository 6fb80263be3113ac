use crate::domain::errors::{ServiceError, ServiceResult};
use governor::{
    clock::{Clock, DefaultClock},
    state::{
        keyed::{DefaultKeyedStateStore, ShrinkableKeyedStateStore},
        StateStore,
    },
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

/// Keyed governor limiter over the state store `S`
pub type KeyedGovernor<S> = GovernorRateLimiter<String, S, DefaultClock>;

/// Quota admitting `max_requests` per `window`, all of them usable as a burst
pub fn window_quota(max_requests: u32, window: Duration) -> ServiceResult<Quota> {
    let burst = NonZeroU32::new(max_requests)
        .ok_or_else(|| ServiceError::validation("Rate limit must allow at least one request"))?;

    let quota = Quota::with_period(window / max_requests)
        .ok_or_else(|| ServiceError::validation("Rate limit window must be non-zero"))?;

    Ok(quota.allow_burst(burst))
}

/// Per-key request limiter.
///
/// The state store is supplied by the caller (see [`RateLimiter::from_governor`]),
/// so each limiter owns its own state and nothing is shared globally. Keys
/// are case-insensitive.
pub struct RateLimiter<S = DefaultKeyedStateStore<String>>
where
    S: StateStore<Key = String>,
{
    limiter: Arc<KeyedGovernor<S>>,
}

impl<S: StateStore<Key = String>> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
        }
    }
}

impl RateLimiter {
    /// Limiter on the default in-memory keyed store
    pub fn keyed(max_requests: u32, window: Duration) -> ServiceResult<Self> {
        let quota = window_quota(max_requests, window)?;
        Ok(Self::from_governor(GovernorRateLimiter::keyed(quota)))
    }
}

impl<S: StateStore<Key = String>> RateLimiter<S> {
    /// Wrap a governor limiter built on any keyed state store
    pub fn from_governor(limiter: KeyedGovernor<S>) -> Self {
        Self {
            limiter: Arc::new(limiter),
        }
    }
}

impl<S> RateLimiter<S>
where
    S: ShrinkableKeyedStateStore<String>,
{
    /// Count one request for `key`.
    ///
    /// Returns Ok(()) if the request is allowed, Err(duration) if rate limited.
    /// The duration indicates how long to wait before retrying.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let key = key.to_lowercase();

        match self.limiter.check_key(&key) {
            Ok(_) => Ok(()),
            Err(negative) => {
                let wait = negative.wait_time_from(DefaultClock::default().now());
                tracing::debug!("Rate limit exceeded for {}, retry in {:?}", key, wait);
                Err(wait)
            }
        }
    }

    /// Drop state for keys whose budget has fully replenished.
    /// Returns the number of keys still tracked.
    pub fn cleanup(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}
