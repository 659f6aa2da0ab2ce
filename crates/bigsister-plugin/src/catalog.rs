//! Explicit table of feature entry points.
//!
//! Features are resolved by `(feature_id, version)` from entries registered
//! at startup; there is no dynamic discovery.

use crate::contract::{EntryPoint, Registration};
use crate::error::ActionError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Table mapping `(feature_id, version)` to a registration entry point.
#[derive(Clone, Default)]
pub struct FeatureCatalog {
    entries: HashMap<(String, String), EntryPoint>,
}

impl FeatureCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the entry point for one feature variant.
    ///
    /// Registering the same pair again replaces the earlier entry point.
    pub fn register(
        &mut self,
        feature_id: &str,
        version: &str,
        entry_point: impl Fn() -> Result<Registration, ActionError> + Send + Sync + 'static,
    ) {
        debug!(feature = %feature_id, version = %version, "registered feature entry point");
        self.entries.insert(
            (feature_id.to_string(), version.to_string()),
            Arc::new(entry_point),
        );
    }

    /// Builder-style [`FeatureCatalog::register`].
    #[must_use]
    pub fn with(
        mut self,
        feature_id: &str,
        version: &str,
        entry_point: impl Fn() -> Result<Registration, ActionError> + Send + Sync + 'static,
    ) -> Self {
        self.register(feature_id, version, entry_point);
        self
    }

    /// Resolve the entry point for a feature variant.
    #[must_use]
    pub fn resolve(&self, feature_id: &str, version: &str) -> Option<EntryPoint> {
        self.entries
            .get(&(feature_id.to_string(), version.to_string()))
            .cloned()
    }

    /// Versions registered for a feature, sorted.
    #[must_use]
    pub fn versions(&self, feature_id: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .entries
            .keys()
            .filter(|(id, _)| id == feature_id)
            .map(|(_, version)| version.clone())
            .collect();
        versions.sort();
        versions
    }

    /// Number of registered entry points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
