pub mod health;
pub mod diagnostics;
pub mod messages;
pub mod permission;
pub mod session;

pub use health::*;
pub use diagnostics::*;
pub use messages::*;
pub use permission::*;
pub use session::*;
