pub mod connctx;
pub mod rooms;

pub use connctx::{Connection, ConnectionHandle, ConnectionId, ConnectionRegistry, IdentityKind};
pub use rooms::RoomDirectory;
