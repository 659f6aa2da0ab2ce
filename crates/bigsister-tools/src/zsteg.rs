//! `zsteg` feature: LSB steganography scan and channel extraction for PNG/BMP.

use crate::html::{
    file_param, input_file, run_failure, to_json, Panel, RawOutput, INVALID_PATH_ERROR,
    INVALID_PATH_NOTE,
};
use crate::runner::{ToolRunner, ToolRuntime};
use bigsister_plugin::{
    param_str, ActionError, ActionResult, EasyOptions, Feature, InvocationContext, Params,
    Registration,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Feature ID.
pub const FEATURE_ID: &str = "zsteg";

/// Output file name used when `params.output_name` is absent.
pub const DEFAULT_OUTPUT_NAME: &str = "zsteg_extract.bin";

const TOOL: &str = "zsteg";
const INSTALL_HINT: &str = "Hint: zsteg is a Ruby gem. Install Ruby then `gem install zsteg`.";
const TIMEOUT: Duration = Duration::from_secs(120);
const SUGGEST_TIMEOUT: Duration = Duration::from_secs(60);
const STDERR_MAX_LINES: usize = 10;
const STDERR_MAX_CHARS: usize = 800;

static CHANNEL_DOTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([a-z0-9_,]+)\s+\.\.\s+(.*)$").expect("channel regex is hardcoded and valid")
});

static CHANNEL_COLON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*([a-z0-9_,]+)\s*:\s*(.+)$").expect("channel regex is hardcoded and valid")
});

static RUBY_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(ruby[/\\]gems|\bzsteg[/\\].*\.rb:|\bopen3\.rb:|lib[/\\]ruby)")
        .expect("backtrace regex is hardcoded and valid")
});

const HINT_WORDS: [&str; 8] = [
    "text:", "utf", "ascii", "zlib", "bzip", "gzip", "png", "pcx",
];

/// One interesting line from a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Channel spec such as `b1,r,lsb,xy`; empty for generic hints
    pub channel: String,
    /// What zsteg reported
    pub desc: String,
}

/// Normalized result of one zsteg action.
#[derive(Debug, Clone, Serialize)]
pub struct ZstegResult {
    /// Always `zsteg`
    pub tool: String,
    /// Whether the run succeeded
    pub ok: bool,
    /// `scan` or `extract`
    pub action: String,
    /// Input file as given
    pub file: String,
    /// Command line that was run
    pub cmd: Vec<String>,
    /// Parsed highlights (scan)
    pub findings: Vec<Finding>,
    /// Files written (extract)
    pub output_files: Vec<String>,
    /// Error text on failure
    pub errors: Option<String>,
    /// Raw process output
    pub raw: RawOutput,
    /// Hints for the user
    pub notes: Vec<String>,
}

impl ZstegResult {
    fn failed(action: &str, file: String, errors: String, notes: Vec<String>) -> Self {
        Self {
            tool: TOOL.to_string(),
            ok: false,
            action: action.to_string(),
            file,
            cmd: Vec::new(),
            findings: Vec::new(),
            output_files: Vec::new(),
            errors: Some(errors),
            raw: RawOutput::default(),
            notes,
        }
    }

    /// Render as an HTML panel.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut panel = Panel::status("Zsteg", &self.action, self.ok)
            .field("File", &self.file)
            .command(&self.cmd)
            .notes(&self.notes);

        if self.action == "scan" {
            let rows: Vec<Vec<String>> = self
                .findings
                .iter()
                .map(|f| vec![f.channel.clone(), f.desc.clone()])
                .collect();
            panel = panel.heading("Findings").table(
                &["Channel", "Description"],
                &rows,
                "No findings parsed. Check raw output.",
            );
        } else {
            panel = panel
                .heading("Output")
                .paths(&self.output_files, "No output written.");
        }

        panel.errors(self.errors.as_deref()).raw(&self.raw).finish()
    }
}

/// Pick likely-interesting lines out of `zsteg -a` output.
#[must_use]
pub fn parse_findings(output: &str) -> Vec<Finding> {
    let mut findings = Vec::new();

    for line in output.lines() {
        if let Some(caps) = CHANNEL_DOTS.captures(line) {
            findings.push(Finding {
                channel: caps[1].to_string(),
                desc: caps[2].to_string(),
            });
            continue;
        }

        if let Some(caps) = CHANNEL_COLON.captures(line) {
            if caps[1].contains(',') {
                findings.push(Finding {
                    channel: caps[1].to_string(),
                    desc: caps[2].to_string(),
                });
                continue;
            }
        }

        let lower = line.to_lowercase();
        if HINT_WORDS.iter().any(|word| lower.contains(word)) || lower.contains("string") {
            findings.push(Finding {
                channel: String::new(),
                desc: line.trim().to_string(),
            });
        }
    }

    findings
}

/// Strip Ruby backtrace frames and cap the size of stderr.
#[must_use]
pub fn sanitize_stderr(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|line| !RUBY_FRAME.is_match(line))
        .filter(|line| !line.trim_start().starts_with("from "))
        .take(STDERR_MAX_LINES)
        .collect();

    let message = lines.join("\n").trim().to_string();
    if message.chars().count() > STDERR_MAX_CHARS {
        let truncated: String = message.chars().take(STDERR_MAX_CHARS).collect();
        format!("{truncated}…")
    } else {
        message
    }
}

fn help_html() -> String {
    Panel::new("Zsteg – Help")
        .paragraph("Detects LSB-hidden data in PNG and BMP images.")
        .markup(
            "  <ul>\n    <li><b>Scan</b>: <code>zsteg -a &lt;file&gt;</code></li>\n    \
             <li><b>Extract</b>: <code>zsteg -E &lt;channel&gt; &lt;file&gt;</code>; set the \
             <code>channel</code> param (e.g. <code>b1,r,lsb,xy</code>) and optionally \
             <code>output_name</code></li>\n    \
             <li>Pick channels from a scan; JPEG input should be converted to PNG first.</li>\n  </ul>\n",
        )
        .finish()
}

/// The zsteg feature.
pub struct Zsteg;

impl Zsteg {
    fn prepare(
        action: &str,
        params: &Params,
    ) -> Result<(PathBuf, ToolRunner, Vec<String>), ZstegResult> {
        let Some(file) = input_file(params) else {
            return Err(ZstegResult::failed(
                action,
                file_param(params),
                INVALID_PATH_ERROR.to_string(),
                vec![INVALID_PATH_NOTE.to_string()],
            ));
        };

        let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
        let mut notes = runner.notes().to_vec();
        if !runner.is_available() {
            return Err(ZstegResult::failed(
                action,
                file_param(params),
                "zsteg runtime not found (native or WSL).".to_string(),
                notes,
            ));
        }
        if needs_no_file(&runner) {
            notes.push("Native zsteg without 'file' detected; will use --no-file.".to_string());
        }

        Ok((file, runner, notes))
    }

    fn base_args(runner: &ToolRunner) -> Vec<String> {
        if needs_no_file(runner) {
            vec!["--no-file".to_string()]
        } else {
            Vec::new()
        }
    }

    /// Scan every channel.
    pub fn scan(params: &Params, ctx: &mut InvocationContext<'_>) -> ZstegResult {
        let (file, runner, mut notes) = match Self::prepare("scan", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let mut args = Self::base_args(&runner);
        args.push("-a".to_string());
        args.push(runner.tool_path(&file));

        let cmd = runner.command_line(&args);
        if ctx.debug() {
            ctx.print(format!("[zsteg] {}", cmd.join(" ")));
        }

        let output = match runner.run(&args, file.parent(), TIMEOUT) {
            Ok(output) => output,
            Err(e) => {
                ctx.eprint(format!("[zsteg] {e}"));
                let mut result =
                    ZstegResult::failed("scan", file_param(params), run_failure(TOOL, "scan", &e), notes);
                result.cmd = cmd;
                return result;
            }
        };

        let stdout = output.stdout_text();
        let stderr = sanitize_stderr(&output.stderr_text());
        let ok = output.success();
        let lower = stderr.to_lowercase();

        if lower.contains("command not found") {
            notes.push("zsteg not installed. Install Ruby and `gem install zsteg`.".to_string());
        }
        if lower.contains("unknown file type") || lower.contains("not supported") {
            notes.push(
                "Input may not be PNG/BMP; consider converting (e.g., `convert input.jpg output.png`)."
                    .to_string(),
            );
        }

        let findings = parse_findings(&stdout);
        debug!(findings = findings.len(), "zsteg scan parsed");

        ZstegResult {
            tool: TOOL.to_string(),
            ok,
            action: "scan".to_string(),
            file: file_param(params),
            cmd,
            findings,
            output_files: Vec::new(),
            errors: if ok {
                None
            } else if stderr.is_empty() {
                Some("Non-zero exit status".to_string())
            } else {
                Some(stderr.clone())
            },
            raw: RawOutput { stdout, stderr },
            notes,
        }
    }

    /// Extract `params.channel` into `params.output_name` beside the input.
    pub fn extract(params: &Params, ctx: &mut InvocationContext<'_>) -> ZstegResult {
        let (file, runner, mut notes) = match Self::prepare("extract", params) {
            Ok(prepared) => prepared,
            Err(result) => return result,
        };

        let channel = param_str(params, "channel").unwrap_or_default().trim();
        if channel.is_empty() {
            notes.push("No channel specified; extraction skipped.".to_string());
            return ZstegResult::failed(
                "extract",
                file_param(params),
                "Missing channel for extraction.".to_string(),
                notes,
            );
        }

        let output_name = param_str(params, "output_name")
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_NAME);
        let out_path = file
            .parent()
            .map_or_else(|| PathBuf::from(output_name), |dir| dir.join(output_name));

        let mut args = Self::base_args(&runner);
        args.push("-E".to_string());
        args.push(channel.to_string());
        args.push(runner.tool_path(&file));

        let cmd = runner.command_line(&args);
        if ctx.debug() {
            ctx.print(format!("[zsteg] {}", cmd.join(" ")));
        }

        let output = match runner.run(&args, file.parent(), TIMEOUT) {
            Ok(output) => output,
            Err(e) => {
                ctx.eprint(format!("[zsteg] {e}"));
                let mut result = ZstegResult::failed(
                    "extract",
                    file_param(params),
                    run_failure(TOOL, "extract", &e),
                    notes,
                );
                result.cmd = cmd;
                return result;
            }
        };

        let stderr = sanitize_stderr(&output.stderr_text());
        let byte_count = output.stdout.len();
        let raw = RawOutput {
            stdout: if byte_count > 0 {
                format!("<{byte_count} bytes>")
            } else {
                String::new()
            },
            stderr,
        };

        let mut result = ZstegResult {
            cmd,
            raw,
            ..ZstegResult::failed("extract", file_param(params), String::new(), Vec::new())
        };

        if output.success() && byte_count > 0 {
            if let Err(e) = fs::write(&out_path, &output.stdout) {
                warn!(path = %out_path.display(), error = %e, "failed to write zsteg output");
                result.errors = Some(format!(
                    "Extraction produced bytes but writing file failed: {e}"
                ));
                result.notes = notes;
                return result;
            }
            info!(path = %out_path.display(), bytes = byte_count, "zsteg channel extracted");
            result.ok = true;
            result.errors = None;
            result.output_files = vec![out_path.to_string_lossy().into_owned()];
        } else {
            let (message, extra) = friendly_error(&output.stderr_text(), &file, &runner, channel);
            notes.extend(extra);
            result.errors = Some(message);
        }

        result.notes = notes;
        result
    }
}

impl Feature for Zsteg {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> ActionResult {
        Ok(Value::String(Self::scan(params, ctx).to_html()))
    }
}

fn needs_no_file(runner: &ToolRunner) -> bool {
    cfg!(windows)
        && matches!(runner.runtime(), ToolRuntime::Native(_))
        && !ToolRunner::detect("file", "").is_available()
}

fn suggest_channels(file: &Path, runner: &ToolRunner) -> Vec<String> {
    let mut args = Zsteg::base_args(runner);
    args.push("-a".to_string());
    args.push(runner.tool_path(file));

    let Ok(output) = runner.run(&args, file.parent(), SUGGEST_TIMEOUT) else {
        return Vec::new();
    };

    let mut channels: Vec<String> = Vec::new();
    for finding in parse_findings(&output.stdout_text()) {
        let channel = finding.channel.trim();
        if !channel.is_empty() && !channels.iter().any(|c| c == channel) {
            channels.push(channel.to_string());
        }
        if channels.len() >= 8 {
            break;
        }
    }
    channels
}

/// Turn raw Ruby errors into a short message plus hints.
fn friendly_error(
    stderr: &str,
    file: &Path,
    runner: &ToolRunner,
    channel: &str,
) -> (String, Vec<String>) {
    let lower = stderr.to_lowercase();

    if lower.contains("no such file or directory - file -n -b -f -") {
        return (
            "zsteg couldn't call the external 'file' tool. Either install MSYS2 'file' or run with --no-file."
                .to_string(),
            vec![
                "MSYS2 tip: install 'file' and add C:\\msys64\\usr\\bin to PATH.".to_string(),
                "--no-file is added automatically on Windows when 'file' is missing.".to_string(),
            ],
        );
    }

    if lower.contains("color_extractor") || lower.contains("undefined method `size' for nil") {
        let mut notes = vec![
            "The channel you provided isn't valid for this image. Use a channel reported by 'zsteg -a'."
                .to_string(),
        ];
        let suggestions = suggest_channels(file, runner);
        if !suggestions.is_empty() {
            let shown: Vec<&str> = suggestions.iter().take(5).map(String::as_str).collect();
            notes.push(format!("Suggested channels: {}", shown.join(", ")));
        }
        notes.push(format!("Attempted channel: {channel}"));
        return (
            "Invalid channel for this image. Pick one from a scan and try again.".to_string(),
            notes,
        );
    }

    if lower.contains("unknown file type") || lower.contains("not supported") {
        return (
            "This format may not be supported by zsteg. Convert to PNG/BMP and retry.".to_string(),
            vec!["Example: convert input.jpg output.png".to_string()],
        );
    }

    let sanitized = sanitize_stderr(stderr);
    if sanitized.is_empty() {
        ("Extraction failed.".to_string(), Vec::new())
    } else {
        (sanitized, Vec::new())
    }
}

/// Entry point.
pub fn register() -> Result<Registration, ActionError> {
    let options = EasyOptions::new("Zsteg – Choose an action:")
        .option("help", "Help / Tips", |_, _| Ok(Value::String(help_html())))
        .option("scan_html", "Scan (HTML)", |params, ctx| {
            Ok(Value::String(Zsteg::scan(params, ctx).to_html()))
        })
        .option("extract_html", "Extract (HTML)", |params, ctx| {
            Ok(Value::String(Zsteg::extract(params, ctx).to_html()))
        })
        .option("scan_json", "Scan (JSON)", |params, ctx| {
            to_json(&Zsteg::scan(params, ctx))
        })
        .option("extract_json", "Extract (JSON)", |params, ctx| {
            to_json(&Zsteg::extract(params, ctx))
        });

    Ok(Registration::new(Arc::new(Zsteg))
        .with_self_test(|| {
            let runner = ToolRunner::detect(TOOL, INSTALL_HINT);
            debug!(available = runner.is_available(), "zsteg self-test");
            true
        })
        .with_shutdown(|| {
            info!("zsteg shutdown");
            Ok(())
        })
        .with_easy_options(options))
}
