pub mod rate_limiter;
pub mod resilience;

pub use rate_limiter::*;
pub use resilience::*;
