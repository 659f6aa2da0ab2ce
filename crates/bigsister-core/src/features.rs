//! Feature configuration layer.
//!
//! Global [`FeatureSettings`] supply every recognized key. Each
//! [`FeatureDefinition`] carries an override table; only keys that already
//! exist in the defaulted set are replaced; anything else is dropped.

use crate::error::{ConfigError, ConfigResult};
use crate::types::FeatureId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settings every feature carries after defaults and overrides are merged.
///
/// The same shape is used for the global defaults and for the effective,
/// per-feature result of [`FeatureDefinition::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    /// Whether the feature is loaded at all
    pub enabled: bool,
    /// Reserved for result caching
    pub cached: bool,
    /// Human-readable name shown in menus and logs
    pub display_name: String,
    /// Variant to load, e.g. `v1_0`
    pub version: String,
    /// Short description shown in listings
    pub description: String,
    /// Icon identifier or glyph
    pub icon: String,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cached: false,
            display_name: String::new(),
            version: "v1_0".to_string(),
            description: String::new(),
            icon: "🧩".to_string(),
        }
    }
}

/// Static configuration entry for one feature.
///
/// In TOML this is one `[[features]]` table: an `id` plus any override keys.
/// The id is kept as written; [`FeatureDefinition::feature_id`] validates it
/// so one malformed entry can't fail the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    /// Feature identifier as configured
    pub id: String,

    /// Keys overriding the global defaults
    #[serde(flatten)]
    pub overrides: toml::Table,
}

impl FeatureDefinition {
    /// Create a definition with no overrides.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            overrides: toml::Table::new(),
        }
    }

    /// The validated feature ID.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if `id` is not a valid [`FeatureId`].
    pub fn feature_id(&self) -> ConfigResult<FeatureId> {
        FeatureId::new(self.id.as_str()).map_err(|e| ConfigError::InvalidValue {
            field: "features.id".to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether the overrides explicitly disable this feature.
    ///
    /// Checked before [`FeatureDefinition::resolve`], so a disabled entry
    /// stays disabled even when its other overrides don't merge.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.overrides.get("enabled").and_then(toml::Value::as_bool) == Some(false)
    }

    /// Add or replace one override key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    /// Merge the global defaults with this definition's overrides.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` when an override has a type that
    /// doesn't match the default it replaces.
    pub fn resolve(&self, defaults: &FeatureSettings) -> ConfigResult<FeatureSettings> {
        let defaults_table = match toml::Value::try_from(defaults) {
            Ok(toml::Value::Table(table)) => table,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "defaults".to_string(),
                    reason: format!("expected a table, got {}", other.type_str()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    field: "defaults".to_string(),
                    reason: e.to_string(),
                })
            }
        };

        for key in self.overrides.keys() {
            if !defaults_table.contains_key(key) {
                debug!(feature = %self.id, key = %key, "ignoring unknown override key");
            }
        }

        let merged = apply_overrides(&defaults_table, &self.overrides);

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::InvalidValue {
                field: format!("features.{}", self.id),
                reason: e.message().to_string(),
            })
    }
}

/// Apply `overrides` onto `defaults`, replacing only keys already present.
///
/// Keys that exist only in `overrides` are dropped.
#[must_use]
pub fn apply_overrides(defaults: &toml::Table, overrides: &toml::Table) -> toml::Table {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        if let Some(slot) = merged.get_mut(key) {
            *slot = value.clone();
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> toml::Table {
        toml::from_str(src).expect("parse table")
    }

    #[test]
    fn test_apply_overrides_replaces_known_keys_only() {
        let defaults = table(
            r#"
enabled = true
version = "v1_0"
"#,
        );
        let overrides = table(
            r#"
version = "v2_0"
extra = "x"
"#,
        );

        let merged = apply_overrides(&defaults, &overrides);

        assert_eq!(
            merged,
            table(
                r#"
enabled = true
version = "v2_0"
"#
            )
        );
    }

    #[test]
    fn test_apply_overrides_keeps_defaults_for_absent_keys() {
        let defaults = table(
            r#"
enabled = true
icon = "x"
"#,
        );
        let merged = apply_overrides(&defaults, &toml::Table::new());
        assert_eq!(merged, defaults);
    }

    #[test]
    fn test_resolve_merges_over_defaults() {
        let id = FeatureId::new("binwalk").expect("valid feature ID");
        let definition = FeatureDefinition::new(id)
            .with("display_name", "Binwalk")
            .with("version", "v2_0")
            .with("unknown_key", 42);

        let effective = definition
            .resolve(&FeatureSettings::default())
            .expect("resolve definition");

        assert!(effective.enabled);
        assert_eq!(effective.display_name, "Binwalk");
        assert_eq!(effective.version, "v2_0");
        assert_eq!(effective.icon, "🧩");
    }

    #[test]
    fn test_resolve_disabled() {
        let id = FeatureId::new("feature_5").expect("valid feature ID");
        let definition = FeatureDefinition::new(id).with("enabled", false);

        let effective = definition
            .resolve(&FeatureSettings::default())
            .expect("resolve definition");
        assert!(!effective.enabled);
    }

    #[test]
    fn test_disabled_wins_over_bad_override() {
        let definition = FeatureDefinition::new("zsteg")
            .with("enabled", false)
            .with("version", 2_i64);

        assert!(definition.is_disabled());
        assert!(definition.resolve(&FeatureSettings::default()).is_err());
        assert!(!FeatureDefinition::new("zsteg").is_disabled());
    }

    #[test]
    fn test_feature_id_validated_late() {
        let definition: FeatureDefinition =
            toml::from_str(r#"id = "Reverse Image""#).expect("parse definition");

        assert_eq!(definition.id, "Reverse Image");
        assert!(matches!(
            definition.feature_id(),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            FeatureDefinition::new("binwalk")
                .feature_id()
                .expect("valid feature ID")
                .as_str(),
            "binwalk"
        );
    }

    #[test]
    fn test_resolve_rejects_type_mismatch() {
        let id = FeatureId::new("zsteg").expect("valid feature ID");
        let definition = FeatureDefinition::new(id).with("enabled", "yes");

        let result = definition.resolve(&FeatureSettings::default());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_definition_from_toml() {
        let definition: FeatureDefinition = toml::from_str(
            r#"
id = "steghide"
display_name = "Steghide"
icon = "lock"
"#,
        )
        .expect("parse definition");

        assert_eq!(definition.id, "steghide");
        assert_eq!(definition.overrides.len(), 2);
        assert!(!definition.overrides.contains_key("id"));
    }
}
