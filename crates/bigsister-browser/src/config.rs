/// Launch options for a [`crate::BrowserSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub sandbox: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            window_width: 1366,
            window_height: 768,
            sandbox: false,
        }
    }
}

impl SessionConfig {
    /// Headless variant, for automation without a display.
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Self::default()
        }
    }
}
