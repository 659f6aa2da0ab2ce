//! The contract every feature plugin satisfies.
//!
//! A feature is reached through a zero-argument [`EntryPoint`] that returns a
//! [`Registration`]: the [`Feature`] instance plus its optional self-test,
//! shutdown hook, and option registry.

use crate::error::ActionError;
use crate::options::OptionRegistry;
use bigsister_core::FeatureId;
use serde_json::Value;
use std::sync::Arc;

/// Parameters passed to every action. Must be a JSON object.
pub type Params = serde_json::Map<String, Value>;

/// What an action returns: any JSON-compatible value, or an error.
pub type ActionResult = std::result::Result<Value, ActionError>;

/// A callable feature action.
pub type Action = Arc<dyn Fn(&Params, &mut InvocationContext<'_>) -> ActionResult + Send + Sync>;

/// Load-time dependency check; `false` means a required dependency is unusable.
pub type SelfTest = Box<dyn Fn() -> bool + Send + Sync>;

/// Teardown hook, run at most once.
pub type ShutdownHook = Box<dyn FnOnce() -> std::result::Result<(), ActionError> + Send>;

/// Registration entry point for one `(feature_id, version)` pair.
pub type EntryPoint =
    Arc<dyn Fn() -> std::result::Result<Registration, ActionError> + Send + Sync>;

/// A pluggable unit of forensic functionality.
///
/// Features that expose several actions usually do so through an option
/// registry and may leave the default action unimplemented.
pub trait Feature: Send + Sync {
    /// Whether [`Feature::run_default`] is implemented.
    fn has_default_action(&self) -> bool {
        false
    }

    /// Run the feature's single default action.
    fn run_default(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        let _ = (params, ctx);
        Err(ActionError::new("Unsupported", "feature has no default action"))
    }
}

/// Record returned by a feature's entry point.
///
/// `instance` is required; the manager rejects records without one.
#[derive(Default)]
pub struct Registration {
    /// The feature object
    pub instance: Option<Arc<dyn Feature>>,
    /// Optional load-time dependency check
    pub self_test: Option<SelfTest>,
    /// Optional teardown hook
    pub shutdown: Option<ShutdownHook>,
    /// Optional table of named actions
    pub easy_options: Option<Box<dyn OptionRegistry>>,
}

impl Registration {
    /// Create a registration for `instance` with no optional capabilities.
    pub fn new(instance: Arc<dyn Feature>) -> Self {
        Self {
            instance: Some(instance),
            ..Self::default()
        }
    }

    /// Attach a self-test.
    #[must_use]
    pub fn with_self_test(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.self_test = Some(Box::new(check));
        self
    }

    /// Attach a shutdown hook.
    #[must_use]
    pub fn with_shutdown(
        mut self,
        hook: impl FnOnce() -> std::result::Result<(), ActionError> + Send + 'static,
    ) -> Self {
        self.shutdown = Some(Box::new(hook));
        self
    }

    /// Attach an option registry.
    #[must_use]
    pub fn with_easy_options(mut self, options: impl OptionRegistry + 'static) -> Self {
        self.easy_options = Some(Box::new(options));
        self
    }
}

/// Diagnostic text an action emits beside its result.
///
/// Surfaces in the response envelope under `_prints`, never in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    stdout: String,
    stderr: String,
}

impl Diagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line to the informational stream.
    pub fn out(&mut self, line: impl AsRef<str>) {
        self.stdout.push_str(line.as_ref());
        self.stdout.push('\n');
    }

    /// Append a line to the error stream.
    pub fn err(&mut self, line: impl AsRef<str>) {
        self.stderr.push_str(line.as_ref());
        self.stderr.push('\n');
    }

    /// Captured informational text.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured error text.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Whether nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

/// Per-call context threaded into every action.
pub struct InvocationContext<'a> {
    debug: bool,
    feature: &'a FeatureId,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> InvocationContext<'a> {
    /// Create a context for one invocation of `feature`.
    pub fn new(debug: bool, feature: &'a FeatureId, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            debug,
            feature,
            diagnostics,
        }
    }

    /// The manager-wide debug flag.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// The feature being invoked.
    #[must_use]
    pub fn feature(&self) -> &FeatureId {
        self.feature
    }

    /// Record an informational line.
    pub fn print(&mut self, line: impl AsRef<str>) {
        self.diagnostics.out(line);
    }

    /// Record an error line.
    pub fn eprint(&mut self, line: impl AsRef<str>) {
        self.diagnostics.err(line);
    }
}

/// Read an optional string parameter, treating JSON null as absent.
#[must_use]
pub fn param_str<'p>(params: &'p Params, key: &str) -> Option<&'p str> {
    params.get(key).and_then(Value::as_str)
}

/// Read a boolean parameter; absent or non-boolean values are `false`.
#[must_use]
pub fn param_flag(params: &Params, key: &str) -> bool {
    params.get(key).and_then(Value::as_bool).unwrap_or(false)
}
