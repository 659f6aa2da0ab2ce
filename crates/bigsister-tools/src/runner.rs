//! External-process runner shared by the tool-wrapping features.
//!
//! Resolves how a command-line tool can be reached (native binary, WSL
//! fallback on Windows, or not at all) and runs it with stdin closed and a
//! hard time bound.

use bigsister_plugin::ActionError;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, warn};

/// How a tool is reached on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRuntime {
    /// Binary found on `PATH`
    Native(PathBuf),
    /// Invoked through `wsl -e <tool>`
    Wsl(PathBuf),
    /// Not reachable
    Missing,
}

/// Captured result of one tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    /// Raw standard output
    pub stdout: Vec<u8>,
    /// Raw standard error
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Whether the process exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Standard output, lossily decoded.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error, lossily decoded.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A resolved external tool.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    tool: String,
    runtime: ToolRuntime,
    notes: Vec<String>,
}

impl ToolRunner {
    /// Resolve `tool` against the current `PATH`.
    ///
    /// `install_hint` is added to the notes when the tool can't be found.
    #[must_use]
    pub fn detect(tool: &str, install_hint: &str) -> Self {
        Self::detect_in(
            tool,
            install_hint,
            std::env::var_os("PATH").as_deref(),
            cfg!(windows),
        )
    }

    /// Resolve `tool` against an explicit search path.
    #[must_use]
    pub fn detect_in(
        tool: &str,
        install_hint: &str,
        search_path: Option<&OsStr>,
        windows: bool,
    ) -> Self {
        let mut notes = Vec::new();

        let runtime = if let Some(exe) = find_executable(tool, search_path, windows) {
            ToolRuntime::Native(exe)
        } else if windows {
            if let Some(wsl) = find_executable("wsl", search_path, windows) {
                notes.push(format!("Using WSL fallback for {tool}."));
                ToolRuntime::Wsl(wsl)
            } else {
                notes.push(format!("{tool} not found on PATH and WSL not available."));
                notes.push(install_hint.to_string());
                ToolRuntime::Missing
            }
        } else {
            notes.push(format!("{tool} not found on PATH."));
            notes.push(install_hint.to_string());
            ToolRuntime::Missing
        };

        debug!(tool = %tool, runtime = ?runtime, "detected tool runtime");

        Self {
            tool: tool.to_string(),
            runtime,
            notes,
        }
    }

    /// Tool name.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Resolved runtime.
    #[must_use]
    pub fn runtime(&self) -> &ToolRuntime {
        &self.runtime
    }

    /// Whether the tool can be run at all.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.runtime != ToolRuntime::Missing
    }

    /// Detection notes for the user.
    #[must_use]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Render a host path the way the tool will see it.
    #[must_use]
    pub fn tool_path(&self, path: &Path) -> String {
        match self.runtime {
            ToolRuntime::Wsl(_) => {
                let absolute = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |dir| dir.join(path))
                };
                to_wsl_path(&absolute.to_string_lossy())
            }
            _ => path.to_string_lossy().into_owned(),
        }
    }

    /// Full command line as it will be executed.
    #[must_use]
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut cmd = match &self.runtime {
            ToolRuntime::Native(exe) => vec![exe.to_string_lossy().into_owned()],
            ToolRuntime::Wsl(_) => vec!["wsl".to_string(), "-e".to_string(), self.tool.clone()],
            ToolRuntime::Missing => vec![self.tool.clone()],
        };
        cmd.extend(args.iter().cloned());
        cmd
    }

    /// Run the tool with `args`.
    ///
    /// Stdin is closed. The process is killed when `timeout` elapses.
    ///
    /// # Errors
    /// - kind `Timeout` if the process outlives `timeout`
    /// - kind `ToolError` if the tool isn't available
    /// - kind `IoError` if the process can't be spawned
    pub fn run(
        &self,
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<ToolOutput, ActionError> {
        let (program, prefix): (&Path, Vec<OsString>) = match &self.runtime {
            ToolRuntime::Native(exe) => (exe.as_path(), Vec::new()),
            ToolRuntime::Wsl(wsl) => (wsl.as_path(), vec!["-e".into(), self.tool.clone().into()]),
            ToolRuntime::Missing => {
                return Err(ActionError::tool(format!(
                    "{} runtime not found (native or WSL).",
                    self.tool
                )))
            }
        };

        debug!(tool = %self.tool, args = ?args, timeout_secs = timeout.as_secs(), "running tool");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(self.run_async(program, &prefix, args, cwd, timeout))
    }

    async fn run_async(
        &self,
        program: &Path,
        prefix: &[OsString],
        args: &[String],
        cwd: Option<&Path>,
        timeout: Duration,
    ) -> Result<ToolOutput, ActionError> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(prefix)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn()?;

        let Ok(output) = tokio::time::timeout(timeout, child.wait_with_output()).await else {
            warn!(tool = %self.tool, timeout_secs = timeout.as_secs(), "tool timed out");
            return Err(ActionError::timeout(&self.tool, timeout.as_secs()));
        };
        let output = output?;

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Map a Windows path onto the WSL mount, e.g. `C:\a\b` → `/mnt/c/a/b`.
///
/// Paths without a drive letter only have their separators converted.
#[must_use]
pub fn to_wsl_path(path: &str) -> String {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            let rest = chars.as_str().replace('\\', "/");
            format!("/mnt/{}{rest}", drive.to_ascii_lowercase())
        }
        _ => path.replace('\\', "/"),
    }
}

fn find_executable(tool: &str, search_path: Option<&OsStr>, windows: bool) -> Option<PathBuf> {
    let search_path = search_path?;
    let candidates: Vec<String> = if windows {
        vec![format!("{tool}.exe"), tool.to_string()]
    } else {
        vec![tool.to_string()]
    };

    std::env::split_paths(search_path).find_map(|dir| {
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
