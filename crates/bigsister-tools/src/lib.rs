//! BigSister Tools - Built-in forensic features.
//!
//! Each module wraps one external tool (or web service) as a feature plugin:
//!
//! - [`exiftool`] - Metadata table via `exiftool -j`
//! - [`zsteg`] - LSB steganography scan/extract for PNG/BMP
//! - [`steghide`] - Embedded payload info/extract for JPG/BMP/WAV/AU
//! - [`binwalk`] - Signature scan, extraction, and entropy
//! - [`iris`] - Reverse image search links and browser hand-off
//!
//! Tools are found on `PATH`, or through WSL on Windows ([`runner`]).
//! Results render through the shared [`html`] panel builder.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod binwalk;
pub mod exiftool;
pub mod html;
pub mod iris;
pub mod runner;
pub mod steghide;
pub mod zsteg;

use bigsister_plugin::FeatureCatalog;

pub use runner::{ToolOutput, ToolRunner, ToolRuntime};

/// Version every built-in feature registers under.
pub const BUILTIN_VERSION: &str = "v1_0";

/// Catalog holding the entry point of every built-in feature.
#[must_use]
pub fn builtin_catalog() -> FeatureCatalog {
    FeatureCatalog::new()
        .with(exiftool::FEATURE_ID, BUILTIN_VERSION, exiftool::register)
        .with(zsteg::FEATURE_ID, BUILTIN_VERSION, zsteg::register)
        .with(steghide::FEATURE_ID, BUILTIN_VERSION, steghide::register)
        .with(binwalk::FEATURE_ID, BUILTIN_VERSION, binwalk::register)
        .with(iris::FEATURE_ID, BUILTIN_VERSION, iris::register)
}
