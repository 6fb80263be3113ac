#![allow(dead_code)]
pub mod realtime_helpers;

pub use realtime_helpers::*;

use estatedesk::ServiceError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared call counter for operations under test
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the 1-based number of this call
    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Network error tagged with the call number that produced it
pub fn network_error(call: u32) -> ServiceError {
    ServiceError::network(format!("connection reset (call {})", call))
}
