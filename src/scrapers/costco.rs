use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use crate::artifacts::DebugArtifacts;
use crate::browser::BrowserSession;
use crate::config::AppConfig;
use crate::extractor::PriceExtractor;
use crate::models::ProductSnapshot;
use crate::retry::{RetryCoordinator, RetryPolicy, SiteProfile};
use crate::scrapers::ProductScraper;
use crate::utils::error::AppError;

const COSTCO_HOME: &str = "https://www.costco.ca/";

/// Ordered name selectors: structured markup first, bare heading last.
const NAME_SELECTORS: &[&str] = &["h1[itemprop=\"name\"]", "h1.product-h1", "h1"];

/// Ordered price selectors. Costco renders several price structures
/// depending on product type and membership tier; `.op-value` shows up on
/// member-only items.
const PRICE_SELECTORS: &[&str] = &[
    ".price-current",
    ".your-price",
    "[automation-id=\"productPriceOutput\"]",
    ".value",
    ".op-value",
];

/// Titles Costco serves instead of a product page when it decides the
/// visitor is a robot.
const BLOCK_SIGNATURES: &[&str] = &["Access Denied", "Secure Connection Failed"];

/// Costco.ca extraction strategy.
///
/// Holds the retry coordinator (and with it the single browser session)
/// behind a mutex: scrape calls for this site are serialized, which both
/// protects the session handle and keeps request pressure low.
pub struct CostcoScraper {
    coordinator: Mutex<RetryCoordinator>,
}

impl CostcoScraper {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let profile = SiteProfile {
            home_url: COSTCO_HOME.to_string(),
            block_signatures: BLOCK_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            ready_selector: "h1".to_string(),
            item_number_patterns: item_number_patterns()?,
        };

        let coordinator = RetryCoordinator::new(
            RetryPolicy::from(&config.scraper),
            profile,
            BrowserSession::new(config.browser.clone()),
            PriceExtractor::new(NAME_SELECTORS, PRICE_SELECTORS)?,
            DebugArtifacts::from_config(config.debug.artifacts_dir.as_deref()),
        );

        Ok(Self {
            coordinator: Mutex::new(coordinator),
        })
    }
}

// Product URLs look like /olive-oil.product.100123456.html, with a bare
// /100123456.html variant on older links.
fn item_number_patterns() -> Result<Vec<Regex>, AppError> {
    [r"\.product\.(\d+)\.html", r"/(\d{9,})\.html"]
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| AppError::Validation(format!("Invalid item pattern: {}", e)))
        })
        .collect()
}

#[async_trait]
impl ProductScraper for CostcoScraper {
    fn name(&self) -> &str {
        "costco"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("costco.ca")
    }

    async fn scrape(&self, url: &str) -> Result<Option<ProductSnapshot>, AppError> {
        let mut coordinator = self.coordinator.lock().await;
        Ok(coordinator.scrape(url).await)
    }
}
