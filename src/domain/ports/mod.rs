pub mod realtime_gateway;
pub mod toaster;

pub use realtime_gateway::*;
pub use toaster::*;
