//! `exiftool_scraper` feature: metadata table for the selected file.

use crate::html::{file_param, input_file, run_failure, Panel, INVALID_PATH_ERROR, INVALID_PATH_NOTE};
use crate::runner::ToolRunner;
use bigsister_plugin::{ActionError, ActionResult, Feature, InvocationContext, Params, Registration};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Feature ID.
pub const FEATURE_ID: &str = "exiftool_scraper";

const TOOL: &str = "exiftool";
const INSTALL_HINT: &str = "Tip (Debian/Ubuntu): `sudo apt install -y libimage-exiftool-perl`.";
const TIMEOUT: Duration = Duration::from_secs(60);

/// Parse `exiftool -j` output into the tag map of the first file.
pub fn parse_metadata(stdout: &str) -> Result<Map<String, Value>, ActionError> {
    let parsed: Value = serde_json::from_str(stdout)?;
    match parsed {
        Value::Array(mut files) if !files.is_empty() => match files.swap_remove(0) {
            Value::Object(tags) => Ok(tags),
            _ => Err(ActionError::tool("exiftool returned a non-object entry")),
        },
        _ => Err(ActionError::tool("exiftool returned no metadata")),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render the tag/value table.
#[must_use]
pub fn metadata_html(file_name: &str, metadata: &Map<String, Value>) -> String {
    let rows: Vec<Vec<String>> = metadata
        .iter()
        .map(|(tag, value)| vec![tag.clone(), display_value(value)])
        .collect();

    Panel::new("EXIFTool Metadata")
        .field("File", file_name)
        .table(&["Tag", "Value"], &rows, "No metadata found.")
        .finish()
}

/// The exiftool scraper feature. It has no options; everything runs through
/// the default action.
pub struct ExifToolScraper;

impl Feature for ExifToolScraper {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        let Some(file) = input_file(params) else {
            return Ok(Value::String(
                Panel::status("EXIFTool", "metadata", false)
                    .field("File", &file_param(params))
                    .notes(&[INVALID_PATH_NOTE.to_string()])
                    .errors(Some(INVALID_PATH_ERROR))
                    .finish(),
            ));
        };

        let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
        if !runner.is_available() {
            return Ok(Value::String(
                Panel::status("EXIFTool", "metadata", false)
                    .field("File", &file_param(params))
                    .notes(runner.notes())
                    .errors(Some("exiftool runtime not found (native or WSL)."))
                    .finish(),
            ));
        }

        let args = vec!["-j".to_string(), runner.tool_path(&file)];
        if ctx.debug() {
            ctx.print(format!("[exiftool] {}", runner.command_line(&args).join(" ")));
        }

        let metadata = runner
            .run(&args, file.parent(), TIMEOUT)
            .and_then(|output| {
                if output.success() {
                    parse_metadata(&output.stdout_text())
                } else {
                    Err(ActionError::tool(output.stderr_text().trim().to_string()))
                }
            });

        let file_name = file
            .file_name()
            .map_or_else(|| file_param(params), |name| name.to_string_lossy().into_owned());

        match metadata {
            Ok(metadata) => {
                debug!(tags = metadata.len(), "exiftool metadata parsed");
                Ok(Value::String(metadata_html(&file_name, &metadata)))
            }
            Err(e) => {
                ctx.eprint(format!("[exiftool] {e}"));
                Ok(Value::String(
                    Panel::status("EXIFTool", "metadata", false)
                        .field("File", &file_name)
                        .errors(Some(run_failure(TOOL, "metadata", &e).as_str()))
                        .finish(),
                ))
            }
        }
    }
}

/// Entry point.
pub fn register() -> Result<Registration, ActionError> {
    Ok(Registration::new(Arc::new(ExifToolScraper))
        .with_self_test(|| {
            let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
            debug!(available = runner.is_available(), "exiftool self-test");
            true
        })
        .with_shutdown(|| {
            info!("exiftool_scraper shutdown");
            Ok(())
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigsister_core::FeatureId;
    use bigsister_plugin::Diagnostics;
    use serde_json::json;

    #[test]
    fn test_parse_metadata() {
        let stdout = r#"[{
          "SourceFile": "photo.jpg",
          "Make": "Canon",
          "ImageWidth": 4000,
          "GPSPosition": "48 deg 51' 29.00\" N"
        }]"#;

        let metadata = parse_metadata(stdout).expect("parse metadata");
        assert_eq!(metadata["Make"], json!("Canon"));
        assert_eq!(metadata["ImageWidth"], json!(4000));
    }

    #[test]
    fn test_parse_metadata_rejects_garbage() {
        assert_eq!(
            parse_metadata("not json").expect_err("garbage").kind(),
            "JsonError"
        );
        assert_eq!(parse_metadata("[]").expect_err("empty").kind(), "ToolError");
    }

    #[test]
    fn test_metadata_html() {
        let mut metadata = Map::new();
        metadata.insert("Make".to_string(), json!("Canon <EOS>"));
        metadata.insert("ImageWidth".to_string(), json!(4000));

        let html = metadata_html("photo.jpg", &metadata);
        assert!(html.contains("<h2>EXIFTool Metadata</h2>"));
        assert!(html.contains("<td>Make</td><td>Canon &lt;EOS&gt;</td>"));
        assert!(html.contains("<td>4000</td>"));
    }

    #[test]
    fn test_invalid_path_is_reported_in_payload() {
        let id = FeatureId::new(FEATURE_ID).expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(false, &id, &mut diagnostics);

        let value = ExifToolScraper
            .run_default(&Params::new(), &mut ctx)
            .expect("default action");
        let html = value.as_str().expect("html string");

        assert!(html.contains(INVALID_PATH_ERROR));
        assert!(html.contains(INVALID_PATH_NOTE));
    }

    #[test]
    fn test_registration_has_no_options() {
        let registration = register().expect("register exiftool_scraper");
        assert!(registration.easy_options.is_none());
        assert!(registration
            .instance
            .is_some_and(|instance| instance.has_default_action()));
    }
}
