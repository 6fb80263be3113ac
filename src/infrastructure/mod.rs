pub mod observability;
pub mod realtime;
pub mod toast;
