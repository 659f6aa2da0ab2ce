//! BigSister Core - Foundation crate for the BigSister forensic shell.
//!
//! This crate provides shared identifiers, error handling, application
//! configuration, and the feature configuration layer that every other
//! BigSister crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based application configuration with XDG paths
//! - [`features`] - Feature defaults, per-feature overrides, and their merge
//! - [`types`] - The validated `FeatureId` newtype
//!
//! # Example
//!
//! ```rust
//! use bigsister_core::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//!
//! for definition in &config.features {
//!     let effective = definition.resolve(&config.defaults)?;
//!     println!("{} -> {}", definition.id, effective.version);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod features;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, GeneralConfig, ManagerConfig, SelfTestPolicy};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use features::{apply_overrides, FeatureDefinition, FeatureSettings};
pub use types::FeatureId;
