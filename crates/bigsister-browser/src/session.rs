use crate::config::SessionConfig;
use crate::error::{BrowserError, Result};
use chrono::{DateTime, Utc};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// A running browser owned by one feature.
///
/// The session carries its own tokio runtime so synchronous callers can
/// drive it. The CDP handler runs on that runtime until the session closes.
pub struct BrowserSession {
    runtime: Runtime,
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    opened: Vec<String>,
    started_at: DateTime<Utc>,
}

impl BrowserSession {
    /// Launch a browser.
    pub fn launch(config: &SessionConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("bigsister-browser")
            .enable_all()
            .build()?;

        let mut builder =
            BrowserConfig::builder().window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        let browser_config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(browser_config))
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        let handler = runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event failed");
                }
            }
        });

        info!(headless = config.headless, "browser session launched");

        Ok(Self {
            runtime,
            browser: Some(browser),
            handler,
            opened: Vec::new(),
            started_at: Utc::now(),
        })
    }

    /// Open `url` in a new tab.
    pub fn open(&mut self, url: &str) -> Result<()> {
        let url = parse_http_url(url)?;
        let browser = self.browser.as_ref().ok_or(BrowserError::Closed)?;

        self.runtime
            .block_on(browser.new_page(url.as_str()))
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;

        debug!(url = %url, "opened tab");
        self.opened.push(url.to_string());
        Ok(())
    }

    /// URLs opened so far, in order.
    pub fn opened(&self) -> &[String] {
        &self.opened
    }

    /// When the browser was launched.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the browser is still running.
    pub fn is_open(&self) -> bool {
        self.browser.is_some()
    }

    /// Close the browser and stop its handler. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        let result = self.runtime.block_on(async {
            browser
                .close()
                .await
                .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
            browser.wait().await?;
            Ok::<(), BrowserError>(())
        });
        self.handler.abort();

        info!(tabs = self.opened.len(), "browser session closed");
        result
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close browser session");
        }
    }
}

/// Parse an absolute `http`/`https` URL with a host.
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(BrowserError::NavigationError(format!(
            "Unsupported scheme: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(BrowserError::NavigationError("No host in URL".to_string()));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_url() {
        let url = parse_http_url("https://tineye.com/search?url=x").expect("valid url");
        assert_eq!(url.host_str(), Some("tineye.com"));

        assert!(parse_http_url("http://subdomain.example.com:8080/path").is_ok());
    }

    #[test]
    fn test_parse_http_url_invalid() {
        assert!(parse_http_url("not-a-url").is_err());
        assert!(parse_http_url("file:///etc/passwd").is_err());
        assert!(parse_http_url("javascript:alert(1)").is_err());
    }
}
