//! Opening the app in a browser once the server is up.

/// Opens URLs. Failures are reported through the return value, never raised.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> bool;
}

/// Honors `BROWSER`: `none` disables opening, any other value names the
/// program to use. Unset means the system default.
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser {
    browser: Option<String>,
}

impl SystemBrowser {
    pub fn new(browser: Option<String>) -> Self {
        Self {
            browser: browser.filter(|b| !b.trim().is_empty()),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.browser
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case("none"))
    }
}

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> bool {
        if self.is_disabled() {
            tracing::debug!(url, "BROWSER=none; not opening");
            return false;
        }
        let result = match &self.browser {
            Some(program) => open::with(url, program),
            None => open::that(url),
        };
        match result {
            Ok(()) => {
                tracing::debug!(url, browser = ?self.browser, "opened browser");
                true
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "could not open browser");
                false
            }
        }
    }
}
