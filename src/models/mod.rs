pub mod alert;
pub mod notification;

pub use alert::*;
pub use notification::*;
