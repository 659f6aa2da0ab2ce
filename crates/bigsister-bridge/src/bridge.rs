//! Adapts external requests onto the feature manager.

use crate::envelope::{self, Envelope};
use bigsister_core::AppConfig;
use bigsister_plugin::{Diagnostics, FeatureCatalog, FeatureManager, Params, PluginError};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Option IDs that select the default action of a feature without options.
pub const DEFAULT_OPTION_ALIASES: [&str; 4] = ["", "default", "run_default", "run"];

/// Name reported in the CLI `_meta` block.
pub const MANAGER_KIND: &str = "feature_manager";

/// Owns a loaded [`FeatureManager`] and turns every request into an
/// [`Envelope`]. Shutdown runs exactly once, either explicitly or on drop.
pub struct InvocationBridge {
    manager: FeatureManager,
    shut_down: AtomicBool,
}

impl InvocationBridge {
    /// Wrap an already loaded manager.
    #[must_use]
    pub fn new(manager: FeatureManager) -> Self {
        Self {
            manager,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Load the features in `config` against `catalog`.
    #[must_use]
    pub fn from_config(config: &AppConfig, catalog: &FeatureCatalog) -> Self {
        Self::new(FeatureManager::from_config(config, catalog))
    }

    /// The wrapped manager.
    #[must_use]
    pub fn manager(&self) -> &FeatureManager {
        &self.manager
    }

    /// Invoke `feature_id`, selecting `option_id` if the feature has options.
    ///
    /// Never fails: every error becomes an `ok: false` envelope.
    #[must_use]
    pub fn invoke(&self, feature_id: &str, option_id: Option<&str>, params: &Params) -> Envelope {
        let Some(feature) = self.manager.get(feature_id) else {
            debug!(feature = %feature_id, "invocation of unknown feature");
            return envelope::from_error(&PluginError::NotFound {
                feature: feature_id.to_string(),
            });
        };

        let option_id = if feature.easy_options().is_some() {
            option_id.filter(|option| !option.is_empty())
        } else {
            match option_id {
                None => None,
                Some(option) if DEFAULT_OPTION_ALIASES.contains(&option) => None,
                Some(option) => {
                    debug!(feature = %feature_id, option = %option, "option on feature without options");
                    return envelope::from_error(&PluginError::NoOptions {
                        feature: feature_id.to_string(),
                    });
                }
            }
        };

        let mut diagnostics = Diagnostics::new();
        let mut result = match self
            .manager
            .invoke_feature(feature_id, option_id, params, &mut diagnostics)
        {
            Ok(value) => envelope::normalize(value),
            Err(e) => {
                debug!(feature = %feature_id, error = %e, "invocation failed");
                envelope::from_error(&e)
            }
        };
        envelope::attach_prints(&mut result, &diagnostics);
        result
    }

    /// Every loaded feature with its options, in load order.
    #[must_use]
    pub fn list(&self) -> Value {
        let features: Vec<Value> = self
            .manager
            .features()
            .map(|feature| {
                let options: Vec<Value> = feature
                    .easy_options()
                    .map(|registry| {
                        registry
                            .list()
                            .into_iter()
                            .map(|option| json!({"id": option.id, "label": option.label}))
                            .collect()
                    })
                    .unwrap_or_default();

                json!({
                    "id": feature.id().as_str(),
                    "label": feature.label(),
                    "description": feature.description(),
                    "icon": feature.icon(),
                    "version": feature.version(),
                    "options": options,
                })
            })
            .collect();

        json!({"ok": true, "features": features})
    }

    /// Run the manager's shutdown sweep once. Returns `false` if it already ran.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("bridge already shut down");
            return false;
        }
        let hooks = self.manager.shutdown();
        info!(hooks, "bridge shut down");
        true
    }

    /// Whether shutdown has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for InvocationBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
