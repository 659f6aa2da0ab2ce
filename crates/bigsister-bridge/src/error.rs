//! Errors raised before a request reaches the feature manager.

use thiserror::Error;

/// Exit code for a successful invocation.
pub const EXIT_OK: u8 = 0;

/// Exit code for an invocation error reported in the envelope.
pub const EXIT_INVOCATION_ERROR: u8 = 1;

/// Exit code for malformed caller input.
pub const EXIT_MALFORMED_INPUT: u8 = 2;

/// Malformed caller input.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// `--params` is not valid JSON
    #[error("Invalid --params: {0}")]
    InvalidParams(#[source] serde_json::Error),

    /// The params value parsed but is not an object
    #[error("{argument} must be a JSON object")]
    NotAnObject {
        /// Which argument carried the value
        argument: &'static str,
    },

    /// `--params-file` could not be read
    #[error("Cannot read --params-file {path}: {error}")]
    ParamsFileRead {
        /// File path as given
        path: String,
        /// Underlying I/O error
        error: std::io::Error,
    },

    /// `--params-file` does not hold valid JSON
    #[error("Invalid --params-file {path}: {error}")]
    ParamsFileJson {
        /// File path as given
        path: String,
        /// Underlying parse error
        error: serde_json::Error,
    },
}

impl BridgeError {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        EXIT_MALFORMED_INPUT
    }
}

/// Result type for bridge input handling.
pub type Result<T> = std::result::Result<T, BridgeError>;
