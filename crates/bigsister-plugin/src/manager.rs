//! Feature manager: load phase, dispatch, and shutdown.
//!
//! Features are loaded once, strictly in definition order. Each definition
//! ends in exactly one [`LoadOutcome`]; failures are logged and counted but
//! never stop the remaining features from loading.

use crate::catalog::FeatureCatalog;
use crate::contract::{Diagnostics, Feature, InvocationContext, Params, ShutdownHook};
use crate::error::{ActionError, PluginError, Result};
use crate::options::OptionRegistry;
use bigsister_core::{AppConfig, FeatureDefinition, FeatureId, FeatureSettings, SelfTestPolicy};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Manager construction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerOptions {
    /// Debug flag exposed to every action through its context
    pub debug: bool,
    /// Effect of a failing self-test
    pub self_test: SelfTestPolicy,
}

/// Terminal state of one feature definition after the load phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `enabled = false`; not an error
    Disabled,
    /// Malformed ID, overrides that could not be merged, or an ID that was
    /// already defined
    InvalidConfig {
        /// What was wrong
        reason: String,
    },
    /// No entry point for `(feature_id, version)`
    ModuleMissing {
        /// The requested version
        version: String,
    },
    /// The entry point returned an error or panicked
    RegisterFailed {
        /// Captured diagnostic
        reason: String,
    },
    /// The registration record lacked an instance
    BadRegistration {
        /// What was missing
        reason: String,
    },
    /// The instance has no way to run anything
    ContractViolation {
        /// What the instance lacks
        reason: String,
    },
    /// The self-test returned false under the blocking policy
    SelfTestFailed,
    /// The feature is available
    Loaded {
        /// Time spent registering and self-testing
        elapsed: Duration,
    },
}

impl LoadOutcome {
    /// Whether this outcome counts as a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Disabled | Self::Loaded { .. })
    }
}

/// Aggregate result of the load phase.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Definitions examined
    pub scanned: usize,
    /// Definitions skipped because they were disabled
    pub disabled: usize,
    /// Definitions that failed to load
    pub failed: usize,
    /// Features now available
    pub loaded: usize,
    /// Per-definition outcomes in definition order
    pub outcomes: Vec<(String, LoadOutcome)>,
}

impl LoadReport {
    fn record(&mut self, id: String, outcome: LoadOutcome) {
        if outcome.is_failure() {
            self.failed += 1;
        } else if outcome == LoadOutcome::Disabled {
            self.disabled += 1;
        } else {
            self.loaded += 1;
        }
        self.outcomes.push((id, outcome));
    }

    /// Outcome recorded for a feature ID.
    #[must_use]
    pub fn outcome(&self, feature_id: &str) -> Option<&LoadOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == feature_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Summary of one loaded feature, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSummary {
    /// Loaded version
    pub version: String,
    /// Display name
    pub display_name: String,
}

/// A successfully loaded feature.
pub struct LoadedFeature {
    id: FeatureId,
    instance: Arc<dyn Feature>,
    easy_options: Option<Box<dyn OptionRegistry>>,
    shutdown: Mutex<Option<ShutdownHook>>,
    settings: FeatureSettings,
}

impl LoadedFeature {
    /// Feature ID.
    #[must_use]
    pub fn id(&self) -> &FeatureId {
        &self.id
    }

    /// Loaded version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.settings.version
    }

    /// Display name, falling back to the ID when none is configured.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.settings.display_name.is_empty() {
            self.id.as_str()
        } else {
            &self.settings.display_name
        }
    }

    /// Configured description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.settings.description
    }

    /// Configured icon.
    #[must_use]
    pub fn icon(&self) -> &str {
        &self.settings.icon
    }

    /// The option registry, if the feature has one.
    #[must_use]
    pub fn easy_options(&self) -> Option<&dyn OptionRegistry> {
        self.easy_options.as_deref()
    }

    /// Whether the feature runs a default action.
    #[must_use]
    pub fn has_default_action(&self) -> bool {
        self.instance.has_default_action()
    }
}

/// Loads features and dispatches invocations to them.
pub struct FeatureManager {
    features: Vec<LoadedFeature>,
    report: LoadReport,
    options: ManagerOptions,
}

impl FeatureManager {
    /// Load every feature in `config` against `catalog`.
    #[must_use]
    pub fn from_config(config: &AppConfig, catalog: &FeatureCatalog) -> Self {
        let options = ManagerOptions {
            debug: config.general.debug,
            self_test: config.manager.self_test,
        };
        Self::load(&config.defaults, &config.features, catalog, options)
    }

    /// Run the load phase over `definitions`, in order.
    #[must_use]
    pub fn load(
        defaults: &FeatureSettings,
        definitions: &[FeatureDefinition],
        catalog: &FeatureCatalog,
        options: ManagerOptions,
    ) -> Self {
        info!(count = definitions.len(), "loading features");

        let mut features = Vec::new();
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for (index, definition) in definitions.iter().enumerate() {
            report.scanned += 1;
            let id = definition.id.clone();

            debug!(
                feature = %id,
                position = index + 1,
                total = definitions.len(),
                "scanning feature"
            );

            let outcome = if seen.insert(id.clone()) {
                match Self::load_one(definition, defaults, catalog, options.self_test) {
                    Ok(feature) => {
                        let elapsed = feature.1;
                        features.push(feature.0);
                        LoadOutcome::Loaded { elapsed }
                    }
                    Err(outcome) => outcome,
                }
            } else {
                LoadOutcome::InvalidConfig {
                    reason: "duplicate feature ID".to_string(),
                }
            };

            match &outcome {
                LoadOutcome::Loaded { elapsed } => {
                    info!(feature = %id, elapsed_ms = elapsed.as_millis(), "feature loaded");
                }
                LoadOutcome::Disabled => info!(feature = %id, "feature disabled, skipping"),
                failure => warn!(feature = %id, outcome = ?failure, "feature failed to load"),
            }

            report.record(id, outcome);
        }

        info!(
            scanned = report.scanned,
            disabled = report.disabled,
            failed = report.failed,
            loaded = report.loaded,
            "feature load complete"
        );

        Self {
            features,
            report,
            options,
        }
    }

    fn load_one(
        definition: &FeatureDefinition,
        defaults: &FeatureSettings,
        catalog: &FeatureCatalog,
        policy: SelfTestPolicy,
    ) -> std::result::Result<(LoadedFeature, Duration), LoadOutcome> {
        if definition.is_disabled() {
            return Err(LoadOutcome::Disabled);
        }

        let id = definition
            .feature_id()
            .map_err(|e| LoadOutcome::InvalidConfig {
                reason: e.to_string(),
            })?;

        let settings = definition
            .resolve(defaults)
            .map_err(|e| LoadOutcome::InvalidConfig {
                reason: e.to_string(),
            })?;

        if !settings.enabled {
            return Err(LoadOutcome::Disabled);
        }

        let Some(entry_point) = catalog.resolve(id.as_str(), &settings.version) else {
            debug!(
                feature = %id,
                requested = %settings.version,
                available = ?catalog.versions(id.as_str()),
                "no entry point for requested version"
            );
            return Err(LoadOutcome::ModuleMissing {
                version: settings.version,
            });
        };

        let start = Instant::now();

        let registration = match catch_unwind(AssertUnwindSafe(|| entry_point())) {
            Ok(Ok(registration)) => registration,
            Ok(Err(e)) => {
                error!(feature = %id, error = %e, "register() failed");
                return Err(LoadOutcome::RegisterFailed {
                    reason: e.to_string(),
                });
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(feature = %id, panic = %reason, "register() panicked");
                return Err(LoadOutcome::RegisterFailed {
                    reason: format!("Panic: {reason}"),
                });
            }
        };

        let instance = registration
            .instance
            .ok_or_else(|| LoadOutcome::BadRegistration {
                reason: "registration record has no instance".to_string(),
            })?;

        if !instance.has_default_action() && registration.easy_options.is_none() {
            return Err(LoadOutcome::ContractViolation {
                reason: "instance has no default action and no option registry".to_string(),
            });
        }

        if let Some(self_test) = &registration.self_test {
            let passed = catch_unwind(AssertUnwindSafe(|| self_test())).unwrap_or(false);
            if passed {
                debug!(feature = %id, "self-test passed");
            } else if policy == SelfTestPolicy::Blocking {
                return Err(LoadOutcome::SelfTestFailed);
            } else {
                warn!(feature = %id, "self-test failed, loading anyway (advisory)");
            }
        } else {
            debug!(feature = %id, "no self-test defined");
        }

        let mut easy_options = registration.easy_options;
        if let Some(options) = easy_options.as_mut() {
            options.set_feature_name(id.as_str());
        }

        let loaded = LoadedFeature {
            id,
            instance,
            easy_options,
            shutdown: Mutex::new(registration.shutdown),
            settings,
        };

        Ok((loaded, start.elapsed()))
    }

    /// Outcome of the load phase.
    #[must_use]
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// The manager-wide debug flag.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.options.debug
    }

    /// Loaded features in load order.
    pub fn features(&self) -> impl Iterator<Item = &LoadedFeature> {
        self.features.iter()
    }

    /// Look up a loaded feature.
    #[must_use]
    pub fn get(&self, feature_id: &str) -> Option<&LoadedFeature> {
        self.features
            .iter()
            .find(|feature| feature.id.as_str() == feature_id)
    }

    /// Version and display name of every loaded feature.
    #[must_use]
    pub fn get_available_features(&self) -> BTreeMap<String, FeatureSummary> {
        self.features
            .iter()
            .map(|feature| {
                (
                    feature.id.to_string(),
                    FeatureSummary {
                        version: feature.version().to_string(),
                        display_name: feature.label().to_string(),
                    },
                )
            })
            .collect()
    }

    /// Invoke a feature.
    ///
    /// With an option registry, `option_id` selects the action; `None`
    /// returns the rendered option menu instead of running anything. Without
    /// one, the default action runs and `option_id` is ignored.
    ///
    /// # Errors
    /// - `PluginError::NotFound` if the feature isn't loaded
    /// - `PluginError::OptionNotFound` if the option isn't registered
    /// - `PluginError::NoDefaultAction` if there is nothing to run
    /// - `PluginError::Action` if the action fails or panics
    pub fn invoke_feature(
        &self,
        feature_id: &str,
        option_id: Option<&str>,
        params: &Params,
        diagnostics: &mut Diagnostics,
    ) -> Result<Value> {
        let feature = self.get(feature_id).ok_or_else(|| PluginError::NotFound {
            feature: feature_id.to_string(),
        })?;

        let mut ctx = InvocationContext::new(self.options.debug, &feature.id, diagnostics);

        match (feature.easy_options(), option_id) {
            (Some(options), Some(option_id)) => {
                let action = options.get_option_callable(option_id)?;
                debug!(feature = %feature.id, option = %option_id, "dispatching option");
                guarded(|| action(params, &mut ctx))
            }
            (Some(options), None) => Ok(Value::String(options.render()?)),
            (None, _) => {
                if !feature.has_default_action() {
                    return Err(PluginError::NoDefaultAction {
                        feature: feature.id.to_string(),
                    });
                }
                debug!(feature = %feature.id, "dispatching default action");
                guarded(|| feature.instance.run_default(params, &mut ctx))
            }
        }
    }

    /// Run every feature's shutdown hook in load order.
    ///
    /// Each hook runs at most once over the manager's lifetime; a failing
    /// hook is logged and the sweep continues. Returns the number of hooks run.
    pub fn shutdown(&self) -> usize {
        info!("shutting down features");
        let mut ran = 0;

        for feature in &self.features {
            let hook = feature
                .shutdown
                .lock()
                .map(|mut slot| slot.take())
                .unwrap_or_else(|poisoned| poisoned.into_inner().take());

            let Some(hook) = hook else { continue };
            ran += 1;

            debug!(feature = %feature.id, "running shutdown hook");
            match catch_unwind(AssertUnwindSafe(hook)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(feature = %feature.id, error = %e, "shutdown hook failed"),
                Err(panic) => warn!(
                    feature = %feature.id,
                    panic = %panic_message(panic.as_ref()),
                    "shutdown hook panicked"
                ),
            }
        }

        ran
    }
}

fn guarded(action: impl FnOnce() -> std::result::Result<Value, ActionError>) -> Result<Value> {
    match catch_unwind(AssertUnwindSafe(action)) {
        Ok(result) => result.map_err(PluginError::Action),
        Err(panic) => Err(PluginError::Action(ActionError::panic(panic_message(
            panic.as_ref(),
        )))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
