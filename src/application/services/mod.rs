pub mod change_mapper;
pub mod notification_center;

pub use change_mapper::{map_change, ChangeSource};
pub use notification_center::{NotificationCenter, SessionContext};
