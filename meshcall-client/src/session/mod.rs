mod mesh_session;
mod session_command;
mod session_handle;
mod session_notification;

pub use mesh_session::*;
pub use session_command::*;
pub use session_handle::*;
pub use session_notification::*;
