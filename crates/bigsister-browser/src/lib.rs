//! Browser session control.
//!
//! Launches a visible Chromium window that features can open pages in, and
//! closes it again on shutdown.

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{BrowserError, Result};
pub use session::{parse_http_url, BrowserSession};
