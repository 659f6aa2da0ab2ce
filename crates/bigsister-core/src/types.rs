//! Validated feature identifier.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

fn identifier_regex() -> &'static Regex {
    static IDENT_REGEX: OnceLock<Regex> = OnceLock::new();
    IDENT_REGEX
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("valid regex"))
}

/// Newtype for feature identifiers with validation.
///
/// Feature IDs are 1-64 ASCII alphanumerics, underscores, or hyphens and must
/// start with an alphanumeric (e.g. `exiftool_scraper`, `binwalk`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureId(String);

impl FeatureId {
    /// Create a new `FeatureId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if identifier_regex().is_match(&id) {
            Ok(Self(id))
        } else {
            Err(CoreError::Validation(format!(
                "invalid feature ID: must be 1-64 alphanumerics, '_' or '-', got '{id}'"
            )))
        }
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FeatureId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.0
    }
}
