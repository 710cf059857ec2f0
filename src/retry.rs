use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::artifacts::DebugArtifacts;
use crate::browser::{AttemptPage, BrowserSession, PageWarmup};
use crate::config::ScraperConfig;
use crate::extractor::{is_valid_price_text, ExtractedFields, PriceExtractor};
use crate::models::ProductSnapshot;
use crate::price::parse_price;

/// How long to wait for the page's readiness selector after navigation.
const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// How long each inner check waits for a price selector to appear.
const PRICE_SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry behavior for one scrape call, as a plain value rather than
/// constants buried in control flow.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Full navigate-extract attempts before giving up.
    pub max_attempts: u32,
    /// Delay between attempts, after the session has been discarded.
    pub attempt_delay: Duration,
    /// Price re-checks within one attempt; prices lazy-load after paint.
    pub price_checks: u32,
    pub price_check_delay: Duration,
    /// Which inner check triggers a full page reload before the next one.
    pub reload_after_check: u32,
    pub navigation_timeout: Duration,
    pub warmup_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_delay: Duration::from_secs(5),
            price_checks: 3,
            price_check_delay: Duration::from_secs(2),
            reload_after_check: 2,
            navigation_timeout: Duration::from_secs(60),
            warmup_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ScraperConfig> for RetryPolicy {
    fn from(config: &ScraperConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            attempt_delay: Duration::from_secs(config.retry_delay_secs),
            price_checks: config.price_check_attempts,
            price_check_delay: Duration::from_secs(config.price_check_delay_secs),
            reload_after_check: config.reload_after_check,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            warmup_timeout: Duration::from_secs(config.warmup_timeout_secs),
        }
    }
}

/// What follows a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Discard the session, wait, run attempt `next_attempt`.
    Retry { next_attempt: u32 },
    GiveUp,
}

impl RetryPolicy {
    pub fn after_failure(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                next_attempt: attempts_made + 1,
            }
        }
    }

    pub fn should_reload(&self, checks_made: u32) -> bool {
        checks_made == self.reload_after_check
    }
}

/// Why an attempt ended without a usable page. All of these are retryable;
/// they are kept apart so the log tells blocks from plain breakage.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("browser session unavailable: {0}")]
    Session(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("blocked or failed load, title: {title:?}")]
    Blocked { title: String },

    #[error("no product name found on page")]
    MissingName,
}

/// A finished attempt: either a full snapshot, or a page that loaded and
/// named the product but never produced a valid price. The latter is a
/// legitimate product state (out of stock, member-only), not a fault, and
/// ends the scrape call without further retries.
enum ScrapeOutcome {
    Snapshot(ProductSnapshot),
    NoPrice,
}

/// Per-site knowledge the retry loop needs: where to warm up, what a
/// blocked page looks like, and how to pull an item number out of a URL.
pub struct SiteProfile {
    pub home_url: String,
    pub block_signatures: Vec<String>,
    pub ready_selector: String,
    pub item_number_patterns: Vec<Regex>,
}

impl SiteProfile {
    pub fn item_number(&self, url: &str) -> String {
        for pattern in &self.item_number_patterns {
            if let Some(captures) = pattern.captures(url) {
                if let Some(m) = captures.get(1) {
                    return m.as_str().to_string();
                }
            }
        }
        "unknown".to_string()
    }

    fn is_blocked_title(&self, title: &str) -> bool {
        title.is_empty() || self.block_signatures.iter().any(|s| title.contains(s.as_str()))
    }
}

/// Drives one scrape call through bounded attempts.
///
/// Each attempt opens an isolated page, warms up, navigates, and extracts;
/// a failed attempt discards the whole browser session before the next one,
/// since a fresh process may present a different fingerprint than one the
/// site has already flagged. The coordinator never raises: exhausted
/// retries, blocks and legitimately absent prices all come back as `None`.
pub struct RetryCoordinator {
    policy: RetryPolicy,
    site: SiteProfile,
    session: BrowserSession,
    warmup: PageWarmup,
    extractor: PriceExtractor,
    artifacts: DebugArtifacts,
}

impl RetryCoordinator {
    pub fn new(
        policy: RetryPolicy,
        site: SiteProfile,
        session: BrowserSession,
        extractor: PriceExtractor,
        artifacts: DebugArtifacts,
    ) -> Self {
        let warmup = PageWarmup::new(site.home_url.clone(), policy.warmup_timeout);
        Self {
            policy,
            site,
            session,
            warmup,
            extractor,
            artifacts,
        }
    }

    /// Browser launch attempts so far, for diagnostics: under retry every
    /// failed attempt forces a relaunch, so this tracks attempt count.
    pub fn session_launch_attempts(&self) -> u64 {
        self.session.launch_count()
    }

    pub async fn scrape(&mut self, url: &str) -> Option<ProductSnapshot> {
        let mut attempt = 1u32;
        loop {
            info!(
                "Scrape attempt {}/{}: {}",
                attempt, self.policy.max_attempts, url
            );

            match self.run_attempt(url).await {
                Ok(ScrapeOutcome::Snapshot(snapshot)) => {
                    info!(
                        "Successfully scraped: {} - ${}",
                        snapshot.name, snapshot.price
                    );
                    return Some(snapshot);
                }
                Ok(ScrapeOutcome::NoPrice) => {
                    info!("No purchasable price for {}", url);
                    return None;
                }
                Err(e) => {
                    warn!("Attempt {} failed for {}: {}", attempt, url, e);
                    match self.policy.after_failure(attempt) {
                        RetryDecision::GiveUp => {
                            warn!(
                                "Giving up on {} after {} attempts",
                                url, self.policy.max_attempts
                            );
                            return None;
                        }
                        RetryDecision::Retry { next_attempt } => {
                            self.session.close();
                            tokio::time::sleep(self.policy.attempt_delay).await;
                            attempt = next_attempt;
                        }
                    }
                }
            }
        }
    }

    async fn run_attempt(&mut self, url: &str) -> Result<ScrapeOutcome, AttemptError> {
        // The page guard closes the tab on every exit path below.
        let page = self
            .session
            .open_page()
            .map_err(|e| AttemptError::Session(e.to_string()))?;

        self.warmup.run(&page).await;

        page.navigate(url, self.policy.navigation_timeout)
            .map_err(|e| AttemptError::Navigation(e.to_string()))?;

        let title = page.title().unwrap_or_default();
        debug!("Product page title: {:?}", title);
        if self.site.is_blocked_title(&title) {
            return Err(AttemptError::Blocked { title });
        }

        if !page.wait_for(&self.site.ready_selector, READY_TIMEOUT) {
            debug!("Timed out waiting for {}, continuing", self.site.ready_selector);
        }

        let fields = self.wait_for_price(&page).await;
        let item_number = self.site.item_number(url);

        if fields.name_text.is_empty() {
            self.dump_failure(&item_number, &page);
            return Err(AttemptError::MissingName);
        }

        match parse_price(&fields.price_text) {
            Some(price) => Ok(ScrapeOutcome::Snapshot(ProductSnapshot::new(
                item_number,
                fields.name_text,
                price,
                url.to_string(),
            ))),
            None => {
                debug!(
                    "Name found but no valid price (text: {:?})",
                    fields.price_text
                );
                self.dump_failure(&item_number, &page);
                Ok(ScrapeOutcome::NoPrice)
            }
        }
    }

    /// Inner bounded sub-retry: re-check for a valid price a few times,
    /// waiting between checks and reloading once, since prices can render
    /// well after the initial paint.
    async fn wait_for_price(&self, page: &AttemptPage) -> ExtractedFields {
        let mut fields = ExtractedFields::default();

        for check in 1..=self.policy.price_checks {
            page.wait_for(self.extractor.price_wait_selector(), PRICE_SELECTOR_TIMEOUT);

            if let Ok(html) = page.content() {
                fields = self.extractor.extract(&html);
                if is_valid_price_text(&fields.price_text) {
                    debug!("Found valid price text: {:?}", fields.price_text);
                    break;
                }
            }

            debug!(
                "Price not ready on check {} (text: {:?})",
                check, fields.price_text
            );

            if check < self.policy.price_checks {
                tokio::time::sleep(self.policy.price_check_delay).await;
                if self.policy.should_reload(check) {
                    debug!("Reloading product page");
                    if let Err(e) = page.reload() {
                        debug!("Reload failed: {}", e);
                    }
                }
            }
        }

        fields
    }

    fn dump_failure(&self, slug: &str, page: &AttemptPage) {
        if let Ok(html) = page.content() {
            self.artifacts.dump_html(slug, &html);
        }
        if let Ok(png) = page.screenshot() {
            self.artifacts.dump_screenshot(slug, &png);
        }
    }
}
