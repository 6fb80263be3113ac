pub mod change_event;
pub mod notification;
pub mod presence;

pub use change_event::*;
pub use notification::*;
pub use presence::*;
