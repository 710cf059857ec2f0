pub mod costco;

use async_trait::async_trait;

use crate::models::ProductSnapshot;
use crate::utils::error::AppError;

pub use costco::CostcoScraper;

/// One extraction strategy for a family of product URLs.
///
/// `scrape` returns `Ok(None)` for "no result" — exhausted retries, a
/// blocked page, or a product legitimately offered without a price all look
/// the same to callers. An `Err` is reserved for faults outside the retry
/// discipline and is caught at the check-cycle boundary.
#[async_trait]
pub trait ProductScraper: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, url: &str) -> bool;
    async fn scrape(&self, url: &str) -> Result<Option<ProductSnapshot>, AppError>;
}

impl std::fmt::Debug for dyn ProductScraper + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductScraper")
            .field("name", &self.name())
            .finish()
    }
}

/// Maps a product URL to the first registered strategy that claims it.
/// An unclaimed URL is a configuration error, surfaced immediately and
/// never retried.
#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn ProductScraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scraper: Box<dyn ProductScraper>) {
        tracing::debug!("Registered scraper: {}", scraper.name());
        self.scrapers.push(scraper);
    }

    pub fn resolve(&self, url: &str) -> Result<&dyn ProductScraper, AppError> {
        self.scrapers
            .iter()
            .find(|s| s.can_handle(url))
            .map(|s| s.as_ref())
            .ok_or_else(|| AppError::NoCapableScraper {
                url: url.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}
