pub mod dbrelay;

pub use dbrelay::PgRelayStore;
