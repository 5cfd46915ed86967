//! # bb-acquire
//!
//! Session-backed content discovery and download for an Ultra learning
//! portal, driven through a real Chromium profile.
//!
//! ## Architecture
//!
//! The crate keeps a strict layering:
//!
//! ### 1. Infrastructure
//! - `infrastructure/` - holds the scarce resource (the page) and exposes
//!   capabilities only
//! - `PageDriver` - the only page owner: navigate / read / evaluate / settle
//! - `browser/` - profile-backed Chromium launch and teardown
//!
//! ### 2. Capabilities
//! - `session/` - cookie and web-storage snapshots, rehydration, replay
//! - `login/` - heuristic signal rules plus the interactive login watcher
//! - `extract/` - pure DOM-snapshot extractors for courses and files
//! - `services/` - section expansion, REST course probe, file transfer
//! - `download/` - filename guessing, sanitizing, filtering, collisions
//!
//! ### 3. Orchestration
//! - `app` - one operation per invocation: login, list-courses,
//!   list-content, download, session-info
//!
//! ### 4. Entry points
//! - `cli` and the binary - argument parsing and stdout rendering
//! - `offload` - blocking runner for hosts without their own runtime
//!
//! ## Module structure

pub mod app;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod offload;

pub mod download;
pub mod extract;
pub mod login;
pub mod services;
pub mod session;
pub mod utils;

// Re-export the common types
pub use app::App;
pub use browser::BrowserSession;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::PageDriver;
pub use session::SessionStore;
