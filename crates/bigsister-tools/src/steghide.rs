//! `steghide` feature: embedded-payload info and extraction.
//!
//! The passphrase comes from `params.passphrase` and is always passed with
//! `-p`, empty or not, so steghide never blocks on a prompt.

use crate::html::{
    file_param, input_file, run_failure, to_json, Panel, RawOutput, INVALID_PATH_ERROR,
    INVALID_PATH_NOTE,
};
use crate::runner::ToolRunner;
use bigsister_plugin::{
    param_str, ActionError, ActionResult, EasyOptions, Feature, InvocationContext, Params,
    Registration,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Feature ID.
pub const FEATURE_ID: &str = "steghide";

/// File written next to the input by `extract`.
pub const EXTRACTED_NAME: &str = "steghide_extracted.bin";

const TOOL: &str = "steghide";
const INSTALL_HINT: &str = "Tip (Debian/Ubuntu): `sudo apt install -y steghide`.";
const TIMEOUT: Duration = Duration::from_secs(60);
const BMP_V5_NOTE: &str =
    "BMP V5 detected; convert to BMP3: convert input.bmp bmp3:output_v3.bmp";
const PASSPHRASE_NOTE: &str = "Possible wrong/empty passphrase or no embedded payload.";

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([^:]+?)\s*:\s*(.+?)\s*$").expect("key/value regex is hardcoded and valid")
});

/// Normalized result of one steghide action.
#[derive(Debug, Clone, Serialize)]
pub struct SteghideResult {
    /// Always `steghide`
    pub tool: String,
    /// Whether the run succeeded
    pub ok: bool,
    /// `info` or `extract`
    pub action: String,
    /// Input file as given
    pub file: String,
    /// Command line, passphrase masked
    pub cmd: Vec<String>,
    /// Parsed `key: value` lines (info)
    pub info: BTreeMap<String, String>,
    /// Files written (extract)
    pub extracted: Vec<String>,
    /// Error text on failure
    pub errors: Option<String>,
    /// Raw process output
    pub raw: RawOutput,
    /// Hints for the user
    pub notes: Vec<String>,
}

impl SteghideResult {
    fn failed(action: &str, file: String, errors: String, notes: Vec<String>) -> Self {
        Self {
            tool: TOOL.to_string(),
            ok: false,
            action: action.to_string(),
            file,
            cmd: Vec::new(),
            info: BTreeMap::new(),
            extracted: Vec::new(),
            errors: Some(errors),
            raw: RawOutput::default(),
            notes,
        }
    }

    /// Render as an HTML panel.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut panel = Panel::status("Steghide", &self.action, self.ok)
            .field("File", &self.file)
            .command(&self.cmd)
            .notes(&self.notes);

        if self.action == "info" {
            let rows: Vec<Vec<String>> = self
                .info
                .iter()
                .map(|(key, value)| vec![key.clone(), value.clone()])
                .collect();
            panel = panel
                .heading("Info")
                .table(&["Key", "Value"], &rows, "No info parsed.");
        } else {
            panel = panel
                .heading("Extracted")
                .paths(&self.extracted, "Nothing extracted.");
        }

        panel.errors(self.errors.as_deref()).raw(&self.raw).finish()
    }
}

/// Parse `key: value` lines from `steghide info -v` output.
///
/// Later keys overwrite earlier ones.
#[must_use]
pub fn parse_info(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter_map(|line| KEY_VALUE.captures(line))
        .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        .collect()
}

fn is_bmp_v5(stdout: &str, stderr: &str) -> bool {
    stdout.contains("format that is not supported")
        || stdout.contains("biSize: 124")
        || stderr.contains("biSize: 124")
}

fn looks_like_bad_passphrase(stdout: &str, stderr: &str) -> bool {
    let combined = format!("{stdout}{stderr}").to_lowercase();
    combined.contains("could not extract any data") || combined.contains("wrong pass")
}

fn masked(cmd: &[String]) -> Vec<String> {
    let mut masked = cmd.to_vec();
    if let Some(pos) = masked.iter().position(|arg| arg == "-p") {
        if let Some(passphrase) = masked.get_mut(pos + 1) {
            *passphrase = "*****".to_string();
        }
    }
    masked
}

fn help_html() -> String {
    Panel::new("Steghide – Help")
        .paragraph("Inspects and extracts payloads hidden in JPEG, BMP, WAV and AU files.")
        .markup(
            "  <ul>\n    <li><b>Info</b>: <code>steghide info -v -sf &lt;file&gt; -p &lt;passphrase&gt;</code></li>\n    \
             <li><b>Extract</b>: <code>steghide extract -sf &lt;file&gt; -xf steghide_extracted.bin -f -p &lt;passphrase&gt;</code></li>\n    \
             <li>Set the <code>passphrase</code> param; an empty passphrase is allowed.</li>\n    \
             <li>BMP V5 files must be converted to BMP3 first.</li>\n  </ul>\n",
        )
        .finish()
}

/// The steghide feature.
pub struct Steghide;

impl Steghide {
    fn prepare(
        action: &str,
        params: &Params,
    ) -> Result<(PathBuf, ToolRunner, Vec<String>), SteghideResult> {
        let Some(file) = input_file(params) else {
            return Err(SteghideResult::failed(
                action,
                file_param(params),
                INVALID_PATH_ERROR.to_string(),
                vec![INVALID_PATH_NOTE.to_string()],
            ));
        };

        let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
        let notes = runner.notes().to_vec();
        if !runner.is_available() {
            return Err(SteghideResult::failed(
                action,
                file_param(params),
                "steghide runtime not found (native or WSL).".to_string(),
                notes,
            ));
        }

        Ok((file, runner, notes))
    }

    /// Report on the embedded payload, if any.
    pub fn info(params: &Params, ctx: &mut InvocationContext<'_>) -> SteghideResult {
        let (file, runner, mut notes) = match Self::prepare("info", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let passphrase = param_str(params, "passphrase").unwrap_or_default();
        let args = vec![
            "info".to_string(),
            "-v".to_string(),
            "-sf".to_string(),
            runner.tool_path(&file),
            "-p".to_string(),
            passphrase.to_string(),
        ];

        let cmd = masked(&runner.command_line(&args));
        if ctx.debug() {
            ctx.print(format!("[steghide] {}", cmd.join(" ")));
        }

        let output = match runner.run(&args, file.parent(), TIMEOUT) {
            Ok(output) => output,
            Err(e) => {
                ctx.eprint(format!("[steghide] {e}"));
                let mut result = SteghideResult::failed(
                    "info",
                    file_param(params),
                    run_failure(TOOL, "info", &e),
                    notes,
                );
                result.cmd = cmd;
                return result;
            }
        };

        let stdout = output.stdout_text();
        let stderr = output.stderr_text();
        let ok = output.success();

        if is_bmp_v5(&stdout, &stderr) {
            notes.push(BMP_V5_NOTE.to_string());
        }
        if !ok && looks_like_bad_passphrase(&stdout, "") {
            notes.push(PASSPHRASE_NOTE.to_string());
        }

        let info = parse_info(&stdout);
        debug!(keys = info.len(), "steghide info parsed");

        SteghideResult {
            tool: TOOL.to_string(),
            ok,
            action: "info".to_string(),
            file: file_param(params),
            cmd,
            info,
            extracted: Vec::new(),
            errors: failure_text(ok, &stderr, "Non-zero exit status"),
            raw: RawOutput { stdout, stderr },
            notes,
        }
    }

    /// Extract the payload to [`EXTRACTED_NAME`] beside the input.
    pub fn extract(params: &Params, ctx: &mut InvocationContext<'_>) -> SteghideResult {
        let (file, runner, mut notes) = match Self::prepare("extract", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let out_path = extraction_target(&file);
        let passphrase = param_str(params, "passphrase").unwrap_or_default();
        let args = vec![
            "extract".to_string(),
            "-sf".to_string(),
            runner.tool_path(&file),
            "-xf".to_string(),
            runner.tool_path(&out_path),
            "-f".to_string(),
            "-p".to_string(),
            passphrase.to_string(),
        ];

        let cmd = masked(&runner.command_line(&args));
        if ctx.debug() {
            ctx.print(format!("[steghide] {}", cmd.join(" ")));
        }

        let output = match runner.run(&args, file.parent(), TIMEOUT) {
            Ok(output) => output,
            Err(e) => {
                ctx.eprint(format!("[steghide] {e}"));
                let mut result = SteghideResult::failed(
                    "extract",
                    file_param(params),
                    run_failure(TOOL, "extract", &e),
                    notes,
                );
                result.cmd = cmd;
                return result;
            }
        };

        let stdout = output.stdout_text();
        let stderr = output.stderr_text();
        let ok = output.success() && out_path.exists();

        if is_bmp_v5(&stdout, &stderr) {
            notes.push(BMP_V5_NOTE.to_string());
        }
        if !ok && looks_like_bad_passphrase(&stdout, &stderr) {
            notes.push(PASSPHRASE_NOTE.to_string());
        }

        let extracted = if ok {
            info!(path = %out_path.display(), "steghide payload extracted");
            vec![out_path.to_string_lossy().into_owned()]
        } else {
            Vec::new()
        };

        SteghideResult {
            tool: TOOL.to_string(),
            ok,
            action: "extract".to_string(),
            file: file_param(params),
            cmd,
            info: BTreeMap::new(),
            extracted,
            errors: failure_text(ok, &stderr, "Extraction failed or produced no file"),
            raw: RawOutput { stdout, stderr },
            notes,
        }
    }
}

impl Feature for Steghide {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        Ok(Value::String(Self::info(params, ctx).to_html()))
    }
}

fn extraction_target(input: &Path) -> PathBuf {
    input
        .parent()
        .map_or_else(|| PathBuf::from(EXTRACTED_NAME), |dir| dir.join(EXTRACTED_NAME))
}

fn failure_text(ok: bool, stderr: &str, fallback: &str) -> Option<String> {
    if ok {
        None
    } else if stderr.is_empty() {
        Some(fallback.to_string())
    } else {
        Some(stderr.to_string())
    }
}

/// Entry point.
pub fn register() -> Result<Registration, ActionError> {
    let options = EasyOptions::new("Steghide – Choose an action:")
        .option("help", "Help / Tips", |_, _| Ok(Value::String(help_html())))
        .option("info_html", "Info (HTML)", |params, ctx| {
            Ok(Value::String(Steghide::info(params, ctx).to_html()))
        })
        .option("extract_html", "Extract (HTML)", |params, ctx| {
            Ok(Value::String(Steghide::extract(params, ctx).to_html()))
        })
        .option("info_json", "Info (JSON)", |params, ctx| {
            to_json(&Steghide::info(params, ctx))
        })
        .option("extract_json", "Extract (JSON)", |params, ctx| {
            to_json(&Steghide::extract(params, ctx))
        });

    Ok(Registration::new(Arc::new(Steghide))
        .with_self_test(|| {
            let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
            debug!(available = runner.is_available(), "steghide self-test");
            true
        })
        .with_shutdown(|| {
            info!("steghide shutdown");
            Ok(())
        })
        .with_easy_options(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigsister_core::FeatureId;
    use bigsister_plugin::{Diagnostics, OptionRegistry};
    use serde_json::json;

    const INFO_OUTPUT: &str = "\"cover.jpg\":
  format: jpeg
  capacity: 3.5 KB
  embedded file \"secret.txt\":
    size: 42.0 Byte
    encrypted: rijndael-128, cbc
    compressed: yes
";

    #[test]
    fn test_parse_info() {
        let info = parse_info(INFO_OUTPUT);

        assert_eq!(info.get("format").map(String::as_str), Some("jpeg"));
        assert_eq!(info.get("capacity").map(String::as_str), Some("3.5 KB"));
        assert_eq!(
            info.get("encrypted").map(String::as_str),
            Some("rijndael-128, cbc")
        );
        assert_eq!(info.get("compressed").map(String::as_str), Some("yes"));
        // A line ending in ':' has no value
        assert!(!info.contains_key("\"cover.jpg\""));
    }

    #[test]
    fn test_masked_hides_passphrase() {
        let cmd: Vec<String> = ["steghide", "info", "-sf", "x.jpg", "-p", "hunter2"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let masked = masked(&cmd);
        assert_eq!(masked[5], "*****");
        assert!(!masked.contains(&"hunter2".to_string()));
    }

    #[test]
    fn test_hints() {
        assert!(is_bmp_v5("the file has a format that is not supported", ""));
        assert!(is_bmp_v5("", "biSize: 124"));
        assert!(!is_bmp_v5("ok", "ok"));
        assert!(looks_like_bad_passphrase("steghide: could not extract any data with that passphrase!", ""));
        assert!(!looks_like_bad_passphrase("fine", ""));
    }

    #[test]
    fn test_extraction_target_is_beside_input() {
        let target = extraction_target(Path::new("/cases/42/cover.jpg"));
        assert_eq!(target, Path::new("/cases/42/steghide_extracted.bin"));
    }

    #[test]
    fn test_invalid_path_is_reported_in_payload() {
        let id = FeatureId::new(FEATURE_ID).expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(false, &id, &mut diagnostics);

        let result = Steghide::extract(&Params::new(), &mut ctx);
        assert!(!result.ok);
        assert_eq!(result.action, "extract");
        assert_eq!(result.file, "");
        assert_eq!(result.errors.as_deref(), Some(INVALID_PATH_ERROR));

        let html = Steghide
            .run_default(&Params::new(), &mut ctx)
            .expect("default action");
        let html = html.as_str().expect("html string");
        assert!(html.contains("Steghide – Info (Failed)"));
        assert!(html.contains(INVALID_PATH_NOTE));
    }

    #[test]
    fn test_info_json_is_structured() {
        let id = FeatureId::new(FEATURE_ID).expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(false, &id, &mut diagnostics);

        let registration = register().expect("register steghide");
        let options = registration.easy_options.expect("steghide has options");
        let action = options.get_option_callable("info_json").expect("info_json");

        let value = action(&Params::new(), &mut ctx).expect("run info_json");
        assert_eq!(value["tool"], json!("steghide"));
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["notes"], json!([INVALID_PATH_NOTE]));
    }
}
