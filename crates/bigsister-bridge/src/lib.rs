//! BigSister Bridge - Invocation bridge for the forensic shell.
//!
//! External callers (the GUI shell, scripts, the `bigsister` binary) address
//! features by ID and get back one JSON envelope per call:
//!
//! - **Bridge** ([`bridge`]): dispatch, listing, and one-shot shutdown
//! - **Envelope** ([`envelope`]): normalization of action return values
//! - **Params** ([`params`]): parsing caller-supplied parameters
//! - **Errors** ([`error`]): malformed input and exit codes
//!
//! # Example
//!
//! ```rust
//! use bigsister_bridge::InvocationBridge;
//! use bigsister_core::AppConfig;
//! use bigsister_plugin::Params;
//!
//! let bridge = InvocationBridge::from_config(&AppConfig::default(), &bigsister_tools::builtin_catalog());
//!
//! let envelope = bridge.invoke("ghost", None, &Params::new());
//! assert_eq!(envelope["ok"], false);
//!
//! bridge.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bridge;
pub mod envelope;
pub mod error;
pub mod params;

// Re-export commonly used types
pub use bridge::{InvocationBridge, DEFAULT_OPTION_ALIASES, MANAGER_KIND};
pub use envelope::{normalize, Envelope};
pub use error::{BridgeError, Result, EXIT_INVOCATION_ERROR, EXIT_MALFORMED_INPUT, EXIT_OK};
pub use params::{load_params, parse_params};
