pub mod disconnect;
pub mod handler;
pub mod msg_auth_handler;
pub mod msg_change_handler;
pub mod msg_cursor_handler;
pub mod msg_join_handler;
pub mod msg_leave_handler;
pub mod msg_ping_handler;
pub mod msg_presence_handler;
pub mod router;

pub use handler::websocket_handler;
pub use router::{MessageRouter, RouterConfig};
