//! `iris` feature: reverse image search.
//!
//! `links` lists search-engine URLs for the selected image. `open` launches a
//! browser once and opens those pages; the browser stays up until shutdown.

use crate::html::{
    file_param, input_file, to_json, Panel, INVALID_PATH_ERROR, INVALID_PATH_NOTE,
};
use bigsister_browser::{parse_http_url, BrowserSession, SessionConfig};
use bigsister_plugin::{
    param_str, ActionError, ActionResult, EasyOptions, Feature, InvocationContext, Params,
    Registration,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use url::Url;

/// Feature ID.
pub const FEATURE_ID: &str = "iris";

/// A reverse image search service.
#[derive(Debug, Clone, Copy)]
pub struct SearchEngine {
    /// Display name
    pub name: &'static str,
    /// Page where an image can be uploaded by hand
    pub upload_page: &'static str,
    search_endpoint: &'static str,
    fixed_params: &'static [(&'static str, &'static str)],
    url_param: &'static str,
    url_prefix: &'static str,
}

impl SearchEngine {
    /// Search URL for an image that is already online.
    #[must_use]
    pub fn search_by_url(&self, image_url: &Url) -> String {
        let value = format!("{}{}", self.url_prefix, image_url);
        let params = self
            .fixed_params
            .iter()
            .copied()
            .chain(std::iter::once((self.url_param, value.as_str())));

        Url::parse_with_params(self.search_endpoint, params)
            .map_or_else(|_| self.upload_page.to_string(), String::from)
    }
}

/// Supported engines, in display order.
pub const ENGINES: [SearchEngine; 4] = [
    SearchEngine {
        name: "Google Lens",
        upload_page: "https://lens.google.com/",
        search_endpoint: "https://lens.google.com/uploadbyurl",
        fixed_params: &[],
        url_param: "url",
        url_prefix: "",
    },
    SearchEngine {
        name: "Bing Visual Search",
        upload_page: "https://www.bing.com/visualsearch",
        search_endpoint: "https://www.bing.com/images/search",
        fixed_params: &[("view", "detailv2"), ("iss", "sbi")],
        url_param: "q",
        url_prefix: "imgurl:",
    },
    SearchEngine {
        name: "TinEye",
        upload_page: "https://tineye.com/",
        search_endpoint: "https://tineye.com/search",
        fixed_params: &[],
        url_param: "url",
        url_prefix: "",
    },
    SearchEngine {
        name: "Yandex Images",
        upload_page: "https://yandex.com/images/",
        search_endpoint: "https://yandex.com/images/search",
        fixed_params: &[("rpt", "imageview")],
        url_param: "url",
        url_prefix: "",
    },
];

/// One engine link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchLink {
    /// Engine name
    pub engine: String,
    /// Where to go
    pub url: String,
}

/// Links for every engine. With an online image the links search it
/// directly; otherwise they point at the upload pages.
#[must_use]
pub fn search_links(image_url: Option<&Url>) -> Vec<SearchLink> {
    ENGINES
        .iter()
        .map(|engine| SearchLink {
            engine: engine.name.to_string(),
            url: image_url.map_or_else(
                || engine.upload_page.to_string(),
                |image| engine.search_by_url(image),
            ),
        })
        .collect()
}

/// Normalized result of one iris action.
#[derive(Debug, Clone, Serialize)]
pub struct IrisResult {
    /// Always `iris`
    pub tool: String,
    /// Whether the action succeeded
    pub ok: bool,
    /// `links` or `open`
    pub action: String,
    /// Input file as given
    pub file: String,
    /// Online copy of the image, if given
    pub image_url: Option<String>,
    /// Engine links
    pub links: Vec<SearchLink>,
    /// Tabs opened by this call
    pub opened: Vec<String>,
    /// When the browser session started (RFC 3339)
    pub session_started: Option<String>,
    /// Error text on failure
    pub errors: Option<String>,
    /// Hints for the user
    pub notes: Vec<String>,
}

impl IrisResult {
    fn failed(action: &str, file: String, errors: String, notes: Vec<String>) -> Self {
        Self {
            tool: FEATURE_ID.to_string(),
            ok: false,
            action: action.to_string(),
            file,
            image_url: None,
            links: Vec::new(),
            opened: Vec::new(),
            session_started: None,
            errors: Some(errors),
            notes,
        }
    }

    /// Render as an HTML panel.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut panel = Panel::status("Iris", &self.action, self.ok)
            .field("File", &self.file)
            .notes(&self.notes);

        if let Some(image_url) = &self.image_url {
            panel = panel.field("Image URL", image_url);
        }

        if !self.links.is_empty() {
            let links: Vec<(String, String)> = self
                .links
                .iter()
                .map(|link| (link.engine.clone(), link.url.clone()))
                .collect();
            panel = panel.heading("Reverse Search").links(&links);
        }

        if self.action == "open" {
            panel = panel
                .heading("Opened")
                .paths(&self.opened, "No tabs opened.");
            if let Some(started) = &self.session_started {
                panel = panel.field("Browser session started", started);
            }
        }

        panel.errors(self.errors.as_deref()).finish()
    }
}

fn help_html() -> String {
    Panel::new("Iris – Help")
        .paragraph("Reverse image search across several engines.")
        .markup(
            "  <ul>\n    <li><b>Links</b>: engine pages for the selected image</li>\n    \
             <li><b>Open</b>: opens every engine in a browser window that stays open until shutdown</li>\n    \
             <li>Set <code>image_url</code> to search an image that is already online; \
             otherwise upload the file on each page.</li>\n  </ul>\n",
        )
        .finish()
}

/// The iris feature. Owns at most one browser session.
pub struct Iris {
    config: SessionConfig,
    session: Mutex<Option<BrowserSession>>,
}

impl Iris {
    /// Create the feature; no browser is started until `open`.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    fn session(&self) -> MutexGuard<'_, Option<BrowserSession>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn resolve(action: &str, params: &Params) -> Result<IrisResult, IrisResult> {
        let image_url = match param_str(params, "image_url").filter(|url| !url.is_empty()) {
            Some(raw) => match parse_http_url(raw) {
                Ok(url) => Some(url),
                Err(e) => {
                    return Err(IrisResult::failed(
                        action,
                        file_param(params),
                        e.to_string(),
                        vec!["image_url must be an http(s) URL.".to_string()],
                    ))
                }
            },
            None => None,
        };

        let file = input_file(params);
        if file.is_none() && image_url.is_none() {
            return Err(IrisResult::failed(
                action,
                file_param(params),
                INVALID_PATH_ERROR.to_string(),
                vec![INVALID_PATH_NOTE.to_string()],
            ));
        }

        let mut notes = Vec::new();
        if image_url.is_none() {
            if let Some(file) = &file {
                notes.push(format!(
                    "Upload {} on each engine's page.",
                    file.display()
                ));
            }
        }

        Ok(IrisResult {
            tool: FEATURE_ID.to_string(),
            ok: true,
            action: action.to_string(),
            file: file_param(params),
            image_url: image_url.as_ref().map(ToString::to_string),
            links: search_links(image_url.as_ref()),
            opened: Vec::new(),
            session_started: None,
            errors: None,
            notes,
        })
    }

    /// Engine links for the selected image.
    #[must_use]
    pub fn links(params: &Params) -> IrisResult {
        Self::resolve("links", params).unwrap_or_else(|failed| failed)
    }

    /// Open every engine link in the browser, launching it on first use.
    pub fn open(&self, params: &Params, ctx: &mut InvocationContext<'_>) -> IrisResult {
        let mut result = match Self::resolve("open", params) {
            Ok(result) => result,
            Err(failed) => return failed,
        };

        let mut guard = self.session();
        if guard.is_none() {
            match BrowserSession::launch(&self.config) {
                Ok(session) => *guard = Some(session),
                Err(e) => {
                    warn!(error = %e, "failed to launch browser");
                    ctx.eprint(format!("[iris] {e}"));
                    result.ok = false;
                    result.errors = Some(format!("Could not launch browser: {e}"));
                    result
                        .notes
                        .push("Install Chrome or Chromium to use this option.".to_string());
                    return result;
                }
            }
        }
        let Some(session) = guard.as_mut() else {
            return result;
        };

        for link in &result.links {
            match session.open(&link.url) {
                Ok(()) => result.opened.push(link.url.clone()),
                Err(e) => {
                    ctx.eprint(format!("[iris] {}: {e}", link.engine));
                    result.notes.push(format!("{} failed to open: {e}", link.engine));
                }
            }
        }
        if ctx.debug() {
            ctx.print(format!("[iris] opened {} tab(s)", result.opened.len()));
        }

        result.ok = !result.opened.is_empty();
        if !result.ok {
            result.errors = Some("No engine page could be opened.".to_string());
        }
        result.session_started = Some(session.started_at().to_rfc3339());
        result
    }

    /// Whether a browser session is running.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session().as_ref().is_some_and(BrowserSession::is_open)
    }

    /// Close the browser session, if any.
    pub fn close_session(&self) -> Result<(), ActionError> {
        let session = self.session().take();
        match session {
            Some(mut session) => {
                debug!(tabs = session.opened().len(), "closing iris browser session");
                session
                    .close()
                    .map_err(|e| ActionError::new("BrowserError", e.to_string()))
            }
            None => Ok(()),
        }
    }
}

impl Feature for Iris {
    fn has_default_action(&self) -> bool {
        true
    }

    fn run_default(&self, params: &Params, _ctx: &mut InvocationContext<'_>) -> ActionResult {
        Ok(Value::String(Self::links(params).to_html()))
    }
}

/// Entry point.
pub fn register() -> Result<Registration, ActionError> {
    let iris = Arc::new(Iris::new(SessionConfig::default()));
    let opener = Arc::clone(&iris);
    let closer = Arc::clone(&iris);

    let options = EasyOptions::new("Iris – Choose an action:")
        .option("help", "Help / Tips", |_, _| Ok(Value::String(help_html())))
        .option("links", "Search Links", |params, _| {
            Ok(Value::String(Iris::links(params).to_html()))
        })
        .option("open", "Open in Browser", move |params, ctx| {
            Ok(Value::String(opener.open(params, ctx).to_html()))
        })
        .option("links_json", "Search Links (JSON)", |params, _| {
            to_json(&Iris::links(params))
        });

    Ok(Registration::new(iris)
        .with_self_test(|| true)
        .with_shutdown(move || {
            info!("iris shutdown");
            closer.close_session()
        })
        .with_easy_options(options))
}
