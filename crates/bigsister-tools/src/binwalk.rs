//! `binwalk` feature: signature scan, extraction, and entropy analysis.

use crate::html::{
    file_param, input_file, run_failure, to_json, Panel, RawOutput, INVALID_PATH_ERROR,
    INVALID_PATH_NOTE,
};
use crate::runner::ToolRunner;
use bigsister_plugin::{
    param_flag, param_str, ActionError, ActionResult, EasyOptions, Feature, InvocationContext,
    Params, Registration,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Feature ID.
pub const FEATURE_ID: &str = "binwalk";

const TOOL: &str = "binwalk";
const INSTALL_HINT: &str = "Tip (Debian/Ubuntu): `sudo apt install -y binwalk`.";
const SCAN_TIMEOUT: Duration = Duration::from_secs(120);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);
const ENTROPY_TIMEOUT: Duration = Duration::from_secs(180);

static SIGNATURE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s+(0x[0-9A-Fa-f]+)\s+(.+)$")
        .expect("signature regex is hardcoded and valid")
});

/// One signature hit from a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Decimal offset
    pub offset: String,
    /// Hexadecimal offset
    pub hex_offset: String,
    /// What was found
    pub description: String,
}

/// Normalized result of one binwalk action.
#[derive(Debug, Clone, Serialize)]
pub struct BinwalkResult {
    /// Always `binwalk`
    pub tool: String,
    /// Whether the run succeeded
    pub ok: bool,
    /// `scan`, `extract`, or `entropy`
    pub action: String,
    /// Input file as given
    pub file: String,
    /// Command line that was run
    pub cmd: Vec<String>,
    /// Signature hits (scan)
    pub signatures: Vec<Signature>,
    /// Paths created by extraction
    pub output_paths: Vec<String>,
    /// Entropy output text
    pub entropy: Option<String>,
    /// Error text on failure
    pub errors: Option<String>,
    /// Raw process output
    pub raw: RawOutput,
    /// Hints for the user
    pub notes: Vec<String>,
}

impl BinwalkResult {
    fn failed(action: &str, file: String, errors: String, notes: Vec<String>) -> Self {
        Self {
            tool: TOOL.to_string(),
            ok: false,
            action: action.to_string(),
            file,
            cmd: Vec::new(),
            signatures: Vec::new(),
            output_paths: Vec::new(),
            entropy: None,
            errors: Some(errors),
            raw: RawOutput::default(),
            notes,
        }
    }

    /// Render as an HTML panel.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut panel = Panel::status("Binwalk", &self.action, self.ok)
            .field("File", &self.file)
            .command(&self.cmd)
            .notes(&self.notes);

        panel = match self.action.as_str() {
            "scan" => {
                let rows: Vec<Vec<String>> = self
                    .signatures
                    .iter()
                    .map(|s| vec![s.offset.clone(), s.hex_offset.clone(), s.description.clone()])
                    .collect();
                panel.heading("Signatures").table(
                    &["Offset", "Hex", "Description"],
                    &rows,
                    "No signatures detected (or parser didn't match). Check raw output.",
                )
            }
            "extract" => panel
                .heading("Output")
                .paths(&self.output_paths, "No output paths found."),
            "entropy" => panel.heading("Entropy").preformatted(
                self.entropy.as_deref().unwrap_or_default(),
                "No entropy output captured.",
            ),
            _ => panel,
        };

        panel.errors(self.errors.as_deref()).raw(&self.raw).finish()
    }
}

/// Parse signature lines out of `binwalk` scan output.
#[must_use]
pub fn parse_signatures(output: &str) -> Vec<Signature> {
    output
        .lines()
        .filter_map(|line| SIGNATURE_LINE.captures(line))
        .map(|caps| Signature {
            offset: caps[1].to_string(),
            hex_offset: caps[2].to_string(),
            description: caps[3].trim().to_string(),
        })
        .collect()
}

fn help_html() -> String {
    Panel::new("Binwalk – Help")
        .paragraph(
            "Scans binaries for embedded files and signatures, extracts content, \
             and performs entropy analysis.",
        )
        .markup(
            "  <ul>\n    <li><b>Signature Scan</b>: <code>binwalk &lt;file&gt;</code></li>\n    \
             <li><b>Extract</b>: <code>binwalk -e -C &lt;output_dir&gt; &lt;file&gt;</code> \
             (<code>output_dir</code> and <code>matryoshka</code> params)</li>\n    \
             <li><b>Entropy</b>: <code>binwalk -E &lt;file&gt;</code></li>\n    \
             <li>Windows users can rely on WSL; it is detected automatically.</li>\n  </ul>\n",
        )
        .finish()
}

/// The binwalk feature.
pub struct Binwalk;

impl Binwalk {
    fn prepare(
        action: &str,
        params: &Params,
    ) -> Result<(PathBuf, ToolRunner, Vec<String>), BinwalkResult> {
        let Some(file) = input_file(params) else {
            return Err(BinwalkResult::failed(
                action,
                file_param(params),
                INVALID_PATH_ERROR.to_string(),
                vec![INVALID_PATH_NOTE.to_string()],
            ));
        };

        let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
        let notes = runner.notes().to_vec();
        if !runner.is_available() {
            return Err(BinwalkResult::failed(
                action,
                file_param(params),
                "binwalk runtime not found (native or WSL).".to_string(),
                notes,
            ));
        }

        Ok((file, runner, notes))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_tool(
        action: &str,
        params: &Params,
        ctx: &mut InvocationContext<'_>,
        runner: &ToolRunner,
        args: Vec<String>,
        cwd: Option<&Path>,
        timeout: Duration,
        mut notes: Vec<String>,
    ) -> (BinwalkResult, String) {
        let cmd = runner.command_line(&args);
        if ctx.debug() {
            ctx.print(format!("[binwalk] {}", cmd.join(" ")));
        }

        let mut result = BinwalkResult {
            cmd,
            ..BinwalkResult::failed(action, file_param(params), String::new(), Vec::new())
        };

        match runner.run(&args, cwd, timeout) {
            Ok(output) => {
                let stdout = output.stdout_text();
                let stderr = output.stderr_text();
                if stderr.to_lowercase().contains("command not found") {
                    notes.push(
                        "binwalk not installed. On Ubuntu: `sudo apt install -y binwalk`."
                            .to_string(),
                    );
                }
                result.ok = output.success();
                result.errors = None;
                result.raw = RawOutput {
                    stdout: stdout.clone(),
                    stderr,
                };
                result.notes = notes;
                (result, stdout)
            }
            Err(e) => {
                ctx.eprint(format!("[binwalk] {e}"));
                result.errors = Some(run_failure(TOOL, action, &e));
                result.notes = notes;
                (result, String::new())
            }
        }
    }

    fn failure_text(result: &BinwalkResult, fallback: &str) -> Option<String> {
        if result.ok {
            None
        } else if result.raw.stderr.is_empty() {
            Some(fallback.to_string())
        } else {
            Some(result.raw.stderr.clone())
        }
    }

    /// Signature scan.
    pub fn scan(params: &Params, ctx: &mut InvocationContext<'_>) -> BinwalkResult {
        let (file, runner, notes) = match Self::prepare("scan", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let args = vec![runner.tool_path(&file)];
        let (mut result, stdout) = Self::run_tool(
            "scan",
            params,
            ctx,
            &runner,
            args,
            file.parent(),
            SCAN_TIMEOUT,
            notes,
        );

        if result.errors.is_none() {
            result.signatures = parse_signatures(&stdout);
            result.errors = Self::failure_text(&result, "Non-zero exit status");
            debug!(signatures = result.signatures.len(), "binwalk scan parsed");
        }
        result
    }

    /// Extract embedded files into `params.output_dir` (default: the input's directory).
    pub fn extract(params: &Params, ctx: &mut InvocationContext<'_>) -> BinwalkResult {
        let (file, runner, notes) = match Self::prepare("extract", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let output_dir = match param_str(params, "output_dir").filter(|dir| !dir.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => file
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };

        if let Err(e) = fs::create_dir_all(&output_dir) {
            return BinwalkResult::failed(
                "extract",
                file_param(params),
                format!("Error running binwalk extract: {e}"),
                notes,
            );
        }

        let before = list_dir(&output_dir);

        let mut args = vec![
            "-e".to_string(),
            "-C".to_string(),
            runner.tool_path(&output_dir),
        ];
        if param_flag(params, "matryoshka") {
            args.push("-M".to_string());
        }
        args.push(runner.tool_path(&file));

        let (mut result, _) = Self::run_tool(
            "extract",
            params,
            ctx,
            &runner,
            args,
            None,
            EXTRACT_TIMEOUT,
            notes,
        );

        if result.errors.is_none() {
            result.output_paths = created_paths(&output_dir, &before, &file);
            result.errors = Self::failure_text(&result, "Extraction failed or produced no output");
            info!(created = result.output_paths.len(), "binwalk extraction finished");
        }
        result
    }

    /// Entropy analysis.
    pub fn entropy(params: &Params, ctx: &mut InvocationContext<'_>) -> BinwalkResult {
        let (file, runner, notes) = match Self::prepare("entropy", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let args = vec!["-E".to_string(), runner.tool_path(&file)];
        let (mut result, stdout) = Self::run_tool(
            "entropy",
            params,
            ctx,
            &runner,
            args,
            file.parent(),
            ENTROPY_TIMEOUT,
            notes,
        );

        if result.errors.is_none() {
            if result.ok {
                result.entropy = Some(stdout);
            }
            result.errors = Self::failure_text(&result, "Non-zero exit status");
        }
        result
    }
}

impl Feature for Binwalk {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        Ok(Value::String(Self::scan(params, ctx).to_html()))
    }
}

fn list_dir(dir: &Path) -> HashSet<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}

fn created_paths(output_dir: &Path, before: &HashSet<PathBuf>, input: &Path) -> Vec<String> {
    let mut created: Vec<PathBuf> = list_dir(output_dir)
        .into_iter()
        .filter(|path| !before.contains(path))
        .collect();

    if let Some(name) = input.file_name() {
        let extracted = output_dir.join(format!("{}.extracted", name.to_string_lossy()));
        if extracted.exists() && !created.contains(&extracted) {
            created.push(extracted);
        }
    }

    created.sort();
    created
        .into_iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}

/// Entry point.
pub fn register() -> Result<Registration, ActionError> {
    let options = EasyOptions::new("Binwalk – Choose an action:")
        .option("help", "Help / Tips", |_, _| Ok(Value::String(help_html())))
        .option("scan_html", "Signature Scan (HTML)", |params, ctx| {
            Ok(Value::String(Binwalk::scan(params, ctx).to_html()))
        })
        .option("extract_html", "Extract (HTML)", |params, ctx| {
            Ok(Value::String(Binwalk::extract(params, ctx).to_html()))
        })
        .option("entropy_html", "Entropy (HTML)", |params, ctx| {
            Ok(Value::String(Binwalk::entropy(params, ctx).to_html()))
        })
        .option("scan_json", "Signature Scan (JSON)", |params, ctx| {
            to_json(&Binwalk::scan(params, ctx))
        })
        .option("extract_json", "Extract (JSON)", |params, ctx| {
            to_json(&Binwalk::extract(params, ctx))
        })
        .option("entropy_json", "Entropy (JSON)", |params, ctx| {
            to_json(&Binwalk::entropy(params, ctx))
        });

    Ok(Registration::new(Arc::new(Binwalk))
        .with_self_test(|| {
            let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
            debug!(available = runner.is_available(), "binwalk self-test");
            true
        })
        .with_shutdown(|| {
            info!("binwalk shutdown");
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
    use tempfile::TempDir;

    const SCAN_OUTPUT: &str = "
DECIMAL       HEXADECIMAL     DESCRIPTION
--------------------------------------------------------------------------------
0             0x0             PNG image, 800 x 600, 8-bit/color RGBA, non-interlaced
91            0x5B            Zlib compressed data, compressed
48213         0xBC55          Zip archive data, at least v2.0 to extract, name: flag.txt
";

    #[test]
    fn test_parse_signatures() {
        let signatures = parse_signatures(SCAN_OUTPUT);

        assert_eq!(signatures.len(), 3);
        assert_eq!(signatures[0].offset, "0");
        assert_eq!(signatures[0].hex_offset, "0x0");
        assert!(signatures[0].description.starts_with("PNG image"));
        assert_eq!(signatures[2].hex_offset, "0xBC55");
        assert!(signatures[2].description.ends_with("name: flag.txt"));
    }

    #[test]
    fn test_parse_signatures_ignores_noise() {
        assert!(parse_signatures("DECIMAL HEXADECIMAL\n----\n\n").is_empty());
    }

    #[test]
    fn test_invalid_path_is_reported_in_payload() {
        let id = FeatureId::new(FEATURE_ID).expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(false, &id, &mut diagnostics);

        let mut params = Params::new();
        params.insert("file_path".to_string(), json!("/no/such/file.bin"));

        let result = Binwalk::scan(&params, &mut ctx);
        assert!(!result.ok);
        assert_eq!(result.action, "scan");
        assert_eq!(result.errors.as_deref(), Some(INVALID_PATH_ERROR));
        assert_eq!(result.notes, vec![INVALID_PATH_NOTE.to_string()]);
        assert!(result.cmd.is_empty());

        let value = to_json(&result).expect("serialize result");
        assert_eq!(value["ok"], json!(false));
        assert_eq!(value["file"], json!("/no/such/file.bin"));
    }

    #[test]
    fn test_html_sections_follow_action() {
        let mut result = BinwalkResult::failed("scan", "a.bin".to_string(), String::new(), vec![]);
        result.ok = true;
        result.errors = None;
        result.signatures = parse_signatures(SCAN_OUTPUT);

        let html = result.to_html();
        assert!(html.contains("Binwalk – Scan (OK)"));
        assert!(html.contains("<td>0xBC55</td>"));
        assert!(!html.contains("<h3>Entropy</h3>"));

        result.action = "entropy".to_string();
        let html = result.to_html();
        assert!(html.contains("No entropy output captured."));
    }

    #[test]
    fn test_created_paths() {
        let dir = TempDir::new().expect("create temp dir");
        let input = dir.path().join("firmware.bin");
        fs::write(&input, b"data").expect("write input");

        let before = list_dir(dir.path());
        fs::create_dir(dir.path().join("firmware.bin.extracted")).expect("create extracted dir");
        fs::write(dir.path().join("carved.zip"), b"zip").expect("write carved file");

        let created = created_paths(dir.path(), &before, &input);
        assert_eq!(created.len(), 2);
        assert!(created.iter().any(|p| p.ends_with("carved.zip")));
        assert!(created.iter().any(|p| p.ends_with("firmware.bin.extracted")));
    }

    #[test]
    fn test_registration_has_all_options() {
        let registration = register().expect("register binwalk");
        let options = registration.easy_options.expect("binwalk has options");
        let ids: Vec<String> = options.list().into_iter().map(|o| o.id).collect();

        assert_eq!(
            ids,
            vec![
                "help",
                "scan_html",
                "extract_html",
                "entropy_html",
                "scan_json",
                "extract_json",
                "entropy_json"
            ]
        );
        assert!(registration.self_test.is_some_and(|self_test| self_test()));
    }

    #[test]
    #[ignore] // Requires binwalk installed
    fn test_scan_real_file() {
        let dir = TempDir::new().expect("create temp dir");
        let input = dir.path().join("sample.bin");
        fs::write(&input, b"\x89PNG\r\n\x1a\n").expect("write sample");

        let id = FeatureId::new(FEATURE_ID).expect("valid feature ID");
        let mut diagnostics = Diagnostics::new();
        let mut ctx = InvocationContext::new(true, &id, &mut diagnostics);
        let mut params = Params::new();
        params.insert("file_path".to_string(), json!(input.to_string_lossy()));

        let result = Binwalk::scan(&params, &mut ctx);
        assert!(result.ok, "binwalk scan failed: {:?}", result.errors);
        assert!(!diagnostics.stdout().is_empty());
    }
}
