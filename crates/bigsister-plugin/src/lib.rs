//! BigSister Plugin - Feature plugin system for the forensic shell.
//!
//! This crate loads independently versioned features, validates what their
//! entry points return, and dispatches invocations to them.
//!
//! # Architecture
//!
//! - **Contract** ([`contract`]): The `Feature` trait, registration record, and invocation context
//! - **Options** ([`options`]): Per-feature table of named sub-actions
//! - **Catalog** ([`catalog`]): Explicit `(feature_id, version)` → entry point table
//! - **Manager** ([`manager`]): Load phase, dispatch, and shutdown
//! - **Errors** ([`error`]): Dispatch and feature-side error types
//!
//! # Example
//!
//! ```rust
//! use bigsister_core::{FeatureDefinition, FeatureId, FeatureSettings};
//! use bigsister_plugin::{
//!     Diagnostics, FeatureCatalog, FeatureManager, ManagerOptions, Params, Registration,
//! };
//! use bigsister_plugin::{EasyOptions, Feature};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! struct Hello;
//! impl Feature for Hello {}
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = FeatureCatalog::new().with("hello", "v1_0", || {
//!     let options = EasyOptions::new("Say:").option("hi", "Hi", |_, _| Ok(json!("hi")));
//!     Ok(Registration::new(Arc::new(Hello)).with_easy_options(options))
//! });
//!
//! let definitions = [FeatureDefinition::new(FeatureId::new("hello")?)];
//! let manager = FeatureManager::load(
//!     &FeatureSettings::default(),
//!     &definitions,
//!     &catalog,
//!     ManagerOptions::default(),
//! );
//!
//! let out = manager.invoke_feature("hello", Some("hi"), &Params::new(), &mut Diagnostics::new())?;
//! assert_eq!(out, json!("hi"));
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod catalog;
pub mod contract;
pub mod error;
pub mod manager;
pub mod options;

// Re-export commonly used types
pub use catalog::FeatureCatalog;
pub use contract::{
    param_flag, param_str, Action, ActionResult, Diagnostics, EntryPoint, Feature,
    InvocationContext, Params, Registration, SelfTest, ShutdownHook,
};
pub use error::{ActionError, PluginError, Result};
pub use manager::{
    FeatureManager, FeatureSummary, LoadOutcome, LoadReport, LoadedFeature, ManagerOptions,
};
pub use options::{escape_html, EasyOptions, OptionInfo, OptionRegistry};
