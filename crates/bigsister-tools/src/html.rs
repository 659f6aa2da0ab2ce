//! HTML panel rendering and shared result plumbing for tool features.

use bigsister_plugin::{escape_html, param_str, ActionError, ActionResult, Params};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Reported when `params.file_path` is absent or not a regular file.
pub const INVALID_PATH_ERROR: &str = "No file selected or invalid path.";

/// Note attached to [`INVALID_PATH_ERROR`].
pub const INVALID_PATH_NOTE: &str = "Select a valid file first.";

/// Raw process output kept with every tool result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawOutput {
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
}

/// The `file_path` parameter as given, empty if absent.
#[must_use]
pub fn file_param(params: &Params) -> String {
    param_str(params, "file_path").unwrap_or_default().to_string()
}

/// The `file_path` parameter, if it names an existing regular file.
#[must_use]
pub fn input_file(params: &Params) -> Option<PathBuf> {
    param_str(params, "file_path")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .filter(|path| path.is_file())
}

/// Error text for a failed run of `tool` performing `action`.
#[must_use]
pub fn run_failure(tool: &str, action: &str, err: &ActionError) -> String {
    if err.is_timeout() {
        format!("Timeout while running {tool} {action}.")
    } else {
        format!("Error running {tool} {action}: {}", err.message())
    }
}

/// Serialize a tool result as the action's structured return value.
pub fn to_json<T: Serialize>(result: &T) -> ActionResult {
    Ok(serde_json::to_value(result)?)
}

/// Uppercase the first character.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Builder for the `<div class="panel">` blocks every tool renders.
///
/// All text passed in is escaped.
pub struct Panel {
    html: String,
}

impl Panel {
    /// Open a panel titled `title`.
    #[must_use]
    pub fn new(title: &str) -> Self {
        let mut html = String::from("<div class=\"panel\">\n");
        let _ = writeln!(html, "  <h2>{}</h2>", escape_html(title));
        Self { html }
    }

    /// Open a panel titled `"<Tool> – <Action> (OK|Failed)"`.
    #[must_use]
    pub fn status(tool: &str, action: &str, ok: bool) -> Self {
        let status = if ok { "OK" } else { "Failed" };
        Self::new(&format!("{tool} – {} ({status})", capitalize(action)))
    }

    /// `<p><b>label:</b> value</p>`
    #[must_use]
    pub fn field(mut self, label: &str, value: &str) -> Self {
        let _ = writeln!(
            self.html,
            "  <p><b>{}:</b> {}</p>",
            escape_html(label),
            escape_html(value)
        );
        self
    }

    /// A command line shown in `<code>`.
    #[must_use]
    pub fn command(mut self, cmd: &[String]) -> Self {
        let _ = writeln!(
            self.html,
            "  <p><b>Command:</b> <code>{}</code></p>",
            escape_html(&cmd.join(" "))
        );
        self
    }

    /// A paragraph of prose.
    #[must_use]
    pub fn paragraph(mut self, text: &str) -> Self {
        let _ = writeln!(self.html, "  <p>{}</p>", escape_html(text));
        self
    }

    /// Notes list; nothing is written when `notes` is empty.
    #[must_use]
    pub fn notes(mut self, notes: &[String]) -> Self {
        if notes.is_empty() {
            return self;
        }
        self.html.push_str("  <div class=\"notes\">\n    <ul>\n");
        for note in notes {
            let _ = writeln!(self.html, "      <li>{}</li>", escape_html(note));
        }
        self.html.push_str("    </ul>\n  </div>\n");
        self
    }

    /// Section heading.
    #[must_use]
    pub fn heading(mut self, text: &str) -> Self {
        let _ = writeln!(self.html, "  <h3>{}</h3>", escape_html(text));
        self
    }

    /// Table with a header row; `empty` is shown instead when there are no rows.
    #[must_use]
    pub fn table(mut self, headers: &[&str], rows: &[Vec<String>], empty: &str) -> Self {
        if rows.is_empty() {
            return self.placeholder(empty);
        }
        self.html.push_str("  <table class=\"kv\">\n    <thead><tr>");
        for header in headers {
            let _ = write!(self.html, "<th>{}</th>", escape_html(header));
        }
        self.html.push_str("</tr></thead>\n    <tbody>\n");
        for row in rows {
            self.html.push_str("      <tr>");
            for cell in row {
                let _ = write!(self.html, "<td>{}</td>", escape_html(cell));
            }
            self.html.push_str("</tr>\n");
        }
        self.html.push_str("    </tbody>\n  </table>\n");
        self
    }

    /// Bulleted list of paths; `empty` is shown instead when there are none.
    #[must_use]
    pub fn paths(mut self, paths: &[String], empty: &str) -> Self {
        if paths.is_empty() {
            return self.placeholder(empty);
        }
        self.html.push_str("  <ul>\n");
        for path in paths {
            let _ = writeln!(self.html, "    <li><code>{}</code></li>", escape_html(path));
        }
        self.html.push_str("  </ul>\n");
        self
    }

    /// Bulleted list of links opening in a new tab.
    #[must_use]
    pub fn links(mut self, links: &[(String, String)]) -> Self {
        self.html.push_str("  <ul>\n");
        for (label, href) in links {
            let _ = writeln!(
                self.html,
                "    <li><a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a></li>",
                escape_html(href),
                escape_html(label)
            );
        }
        self.html.push_str("  </ul>\n");
        self
    }

    /// Preformatted block; `empty` is shown instead when `text` is blank.
    #[must_use]
    pub fn preformatted(mut self, text: &str, empty: &str) -> Self {
        if text.trim().is_empty() {
            return self.placeholder(empty);
        }
        let _ = writeln!(self.html, "  <pre>{}</pre>", escape_html(text));
        self
    }

    /// Error block, written only when `errors` is set.
    #[must_use]
    pub fn errors(mut self, errors: Option<&str>) -> Self {
        if let Some(errors) = errors {
            let _ = writeln!(
                self.html,
                "  <div class=\"error\">\n    <h3>Errors</h3>\n    <pre>{}</pre>\n  </div>",
                escape_html(errors)
            );
        }
        self
    }

    /// Collapsible raw output.
    #[must_use]
    pub fn raw(mut self, raw: &RawOutput) -> Self {
        let _ = writeln!(
            self.html,
            "  <details>\n    <summary>Raw Output</summary>\n    <pre>{}</pre>",
            escape_html(&raw.stdout)
        );
        if !raw.stderr.is_empty() {
            let _ = writeln!(
                self.html,
                "    <pre style=\"color:#c00\">{}</pre>",
                escape_html(&raw.stderr)
            );
        }
        self.html.push_str("  </details>\n");
        self
    }

    /// Arbitrary trusted markup.
    #[must_use]
    pub fn markup(mut self, html: &str) -> Self {
        self.html.push_str(html);
        self
    }

    fn placeholder(mut self, text: &str) -> Self {
        let _ = writeln!(self.html, "  <p><i>{}</i></p>", escape_html(text));
        self
    }

    /// Close the panel.
    #[must_use]
    pub fn finish(mut self) -> String {
        self.html.push_str("</div>\n");
        self.html
    }
}
