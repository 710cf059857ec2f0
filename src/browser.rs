use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use tracing::debug;

use crate::config::BrowserConfig;
use crate::utils::error::AppError;

/// Simulated dwell on the home page before moving on to the product.
const WARMUP_DWELL_MS: std::ops::Range<u64> = 2000..4000;

/// Chrome tends to reap idle sessions aggressively; the session must
/// survive the gap between check cycles.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Owns the single lazily-launched browser subprocess.
///
/// The handle is exclusive: no other component keeps a browser reference
/// across calls. `close` invalidates the session so the next `open_page`
/// launches a fresh process with a fresh fingerprint.
pub struct BrowserSession {
    config: BrowserConfig,
    browser: Option<Browser>,
    launches: u64,
}

impl BrowserSession {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: None,
            launches: 0,
        }
    }

    /// Open a page in a fresh incognito context (own cookies and storage)
    /// on the live session, launching one if needed. The returned guard
    /// closes the tab when dropped, on every exit path of an attempt.
    pub fn open_page(&mut self) -> Result<AttemptPage, AppError> {
        let user_agent = self.config.user_agent.clone();
        let accept_language = self.config.accept_language.clone();

        let browser = self.acquire()?;
        let context = browser
            .new_context()
            .map_err(|e| AppError::Browser(format!("Failed to create browsing context: {}", e)))?;
        let tab = context
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to open tab: {}", e)))?;

        tab.set_user_agent(&user_agent, Some(&accept_language), None)
            .map_err(|e| AppError::Browser(format!("Failed to set user agent: {}", e)))?;

        Ok(AttemptPage { tab })
    }

    /// Terminate the session and clear the handle. Idempotent; dropping the
    /// browser handle kills the subprocess.
    pub fn close(&mut self) {
        if self.browser.take().is_some() {
            debug!("Browser session closed");
        }
    }

    /// How many browser launches have been attempted. Retry rotation shows
    /// up here: every post-failure attempt launches afresh.
    pub fn launch_count(&self) -> u64 {
        self.launches
    }

    fn acquire(&mut self) -> Result<&Browser, AppError> {
        match self.browser {
            Some(ref browser) => Ok(browser),
            None => {
                self.launches += 1;
                let browser = self.launch()?;
                debug!("Launched browser session #{}", self.launches);
                Ok(&*self.browser.insert(browser))
            }
        }
    }

    fn launch(&self) -> Result<Browser, AppError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-backgrounding-occluded-windows"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))
    }
}

/// A page opened for one scrape attempt. Closing is handled by `Drop` so no
/// exit path can leak the tab.
pub struct AttemptPage {
    tab: Arc<Tab>,
}

impl AttemptPage {
    pub fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AppError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .map_err(|e| AppError::Browser(format!("Navigation to {} failed: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| AppError::Browser(format!("Page load of {} failed: {}", url, e)))?;
        Ok(())
    }

    pub fn title(&self) -> Result<String, AppError> {
        self.tab
            .get_title()
            .map_err(|e| AppError::Browser(format!("Failed to read page title: {}", e)))
    }

    pub fn content(&self) -> Result<String, AppError> {
        self.tab
            .get_content()
            .map_err(|e| AppError::Browser(format!("Failed to get page content: {}", e)))
    }

    /// Wait for a selector to appear; `false` on timeout. Prices lazy-load
    /// after first paint, so a timeout here is routine, not an error.
    pub fn wait_for(&self, selector: &str, timeout: Duration) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .is_ok()
    }

    pub fn reload(&self) -> Result<(), AppError> {
        self.tab
            .reload(false, None)
            .map(|_| ())
            .map_err(|e| AppError::Browser(format!("Page reload failed: {}", e)))
    }

    pub fn screenshot(&self) -> Result<Vec<u8>, AppError> {
        self.tab
            .capture_screenshot(
                headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
                None,
                None,
                true,
            )
            .map_err(|e| AppError::Browser(format!("Screenshot capture failed: {}", e)))
    }
}

impl Drop for AttemptPage {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!("Failed to close tab: {}", e);
        }
    }
}

/// Best-effort navigation to the site's home page before the product page,
/// to pick up the cookies and session state that gate product access.
pub struct PageWarmup {
    home_url: String,
    timeout: Duration,
}

impl PageWarmup {
    pub fn new(home_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            home_url: home_url.into(),
            timeout,
        }
    }

    /// Never raises: a failed warmup only lowers the odds that the product
    /// navigation is treated as legitimate traffic, it does not end the
    /// attempt.
    pub async fn run(&self, page: &AttemptPage) {
        debug!("Warming up session via {}", self.home_url);
        if let Err(e) = page.navigate(&self.home_url, self.timeout) {
            debug!("Home page warmup failed, continuing to product: {}", e);
            return;
        }

        let dwell = rand::thread_rng().gen_range(WARMUP_DWELL_MS);
        tokio::time::sleep(Duration::from_millis(dwell)).await;
    }
}
