//! Error types for the feature plugin subsystem.

use thiserror::Error;

/// Errors returned by feature dispatch.
///
/// Every variant is scoped to a single invocation; none of them invalidates
/// the manager.
#[derive(Error, Debug)]
pub enum PluginError {
    /// No loaded feature has this ID
    #[error("Unknown feature '{feature}'")]
    NotFound {
        /// The requested feature ID
        feature: String,
    },

    /// The feature's option registry has no option with this ID
    #[error("Option '{option}' not found")]
    OptionNotFound {
        /// The requested option ID
        option: String,
    },

    /// An option was requested from a feature without an option registry
    #[error("Feature '{feature}' has no easy options")]
    NoOptions {
        /// The feature ID
        feature: String,
    },

    /// The feature has neither an option registry nor a default action
    #[error("Feature '{feature}' has no options and no default action")]
    NoDefaultAction {
        /// The feature ID
        feature: String,
    },

    /// An object was used before it was fully set up
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The feature action itself failed
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Error raised by feature code: entry points, actions, and teardown.
///
/// Carries a short `kind` (e.g. `Timeout`, `InvalidInput`) that callers
/// render in front of the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ActionError {
    kind: String,
    message: String,
}

impl ActionError {
    /// Create an error with an explicit kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Caller-supplied parameters were unusable.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new("InvalidInput", message)
    }

    /// An external process exceeded its time bound.
    pub fn timeout(tool: &str, secs: u64) -> Self {
        Self::new("Timeout", format!("timeout after {secs}s while running {tool}"))
    }

    /// An external tool could not be started or misbehaved.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::new("ToolError", message)
    }

    /// A panic was caught at the manager boundary.
    pub fn panic(message: impl Into<String>) -> Self {
        Self::new("Panic", message)
    }

    /// The error kind.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The error message without the kind prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this error reports an exceeded time bound.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == "Timeout"
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        Self::new("IoError", err.to_string())
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        Self::new("JsonError", err.to_string())
    }
}

/// Result type for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PluginError::NotFound {
            feature: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown feature 'ghost'");
    }

    #[test]
    fn test_action_error_display() {
        let err = ActionError::new("ValueError", "bad input");
        assert_eq!(err.to_string(), "ValueError: bad input");
        assert_eq!(err.kind(), "ValueError");
        assert_eq!(err.message(), "bad input");
    }

    #[test]
    fn test_action_error_is_transparent() {
        let err: PluginError = ActionError::invalid_input("missing file_path").into();
        assert_eq!(err.to_string(), "InvalidInput: missing file_path");
    }

    #[test]
    fn test_timeout_marker() {
        let err = ActionError::timeout("binwalk", 120);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: ActionError = io_err.into();
        assert_eq!(err.kind(), "IoError");
    }
}
