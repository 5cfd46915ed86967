//! Persistent session state: cookie snapshots, web storage dumps, and the
//! confirmed login host.

pub mod cookies;
pub mod store;
pub mod web_storage;

pub use cookies::CookieRecord;
pub use store::SessionStore;
