//! Threadpost - post threads to Bluesky from the command line
//!
//! This library holds the thread-posting pipeline: login, draft
//! persistence, Unicode text styling and sequential publication of a
//! linked reply chain over the AT Protocol.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod format;
pub mod logging;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, ThreadpostError};
pub use service::ThreadpostService;
pub use types::{FormatStyle, PostDraft, PostRecord, PublishedPost, Session};
