//! Browser lifecycle management.

pub mod launcher;

pub use launcher::BrowserSession;
