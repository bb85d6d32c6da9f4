pub mod memory_store;
pub mod permission_service;
pub mod session_service;
pub mod user_cache;

pub use memory_store::{InMemoryPermissions, InMemorySessions};
pub use permission_service::PermissionOracle;
pub use session_service::SessionStore;
pub use user_cache::CachedPermissionOracle;
