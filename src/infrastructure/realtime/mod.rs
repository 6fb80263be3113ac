pub mod local_hub;

pub use local_hub::{LocalPresenceChannel, LocalRealtimeHub};
