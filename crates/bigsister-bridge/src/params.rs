//! Caller-supplied invocation parameters.

use crate::error::{BridgeError, Result};
use bigsister_plugin::Params;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parse `--params` text. Blank input means no parameters.
pub fn parse_params(text: &str) -> Result<Params> {
    if text.trim().is_empty() {
        return Ok(Params::new());
    }
    let value: Value = serde_json::from_str(text).map_err(BridgeError::InvalidParams)?;
    into_object(value, "--params")
}

/// Read parameters from a JSON file.
pub fn read_params_file(path: &Path) -> Result<Params> {
    let display = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|error| BridgeError::ParamsFileRead {
        path: display.clone(),
        error,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|error| {
        BridgeError::ParamsFileJson {
            path: display,
            error,
        }
    })?;
    into_object(value, "--params-file")
}

/// Resolve the parameters for one invocation; a params file wins over
/// inline text.
pub fn load_params(inline: &str, file: Option<&Path>) -> Result<Params> {
    match file {
        Some(path) => read_params_file(path),
        None => parse_params(inline),
    }
}

fn into_object(value: Value, argument: &'static str) -> Result<Params> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BridgeError::NotAnObject { argument }),
    }
}
