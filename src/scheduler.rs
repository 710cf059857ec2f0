use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::time::Instant;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

use crate::change::ChangeDetector;
use crate::models::TrackedProduct;
use crate::notify::{Notifier, PriceAlert};
use crate::scrapers::ScraperRegistry;
use crate::storage::ProductStore;

/// How long shutdown waits for an in-flight cycle to finish its cleanup.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub products_checked: usize,
    pub snapshots_captured: usize,
    pub changes_detected: usize,
    pub notifications_sent: usize,
    pub failures: usize,
}

/// One pass over every tracked product: resolve a strategy, scrape, persist
/// the new price, detect a change, fan out notifications.
///
/// Products are processed sequentially in store order; a scrape may hold a
/// whole browser process, and hitting the site from several sessions at
/// once trips its rate defenses faster. Per-product failures are caught
/// here and never abort the rest of the cycle.
pub struct CheckCycle {
    registry: Arc<ScraperRegistry>,
    store: Arc<dyn ProductStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    detector: ChangeDetector,
}

impl CheckCycle {
    pub fn new(
        registry: Arc<ScraperRegistry>,
        store: Arc<dyn ProductStore>,
        notifiers: Vec<Arc<dyn Notifier>>,
        detector: ChangeDetector,
    ) -> Self {
        Self {
            registry,
            store,
            notifiers,
            detector,
        }
    }

    pub async fn run_once(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();

        let products = match self.store.list_tracked_products().await {
            Ok(products) => products,
            Err(e) => {
                error!("Failed to list tracked products: {}", e);
                return summary;
            }
        };

        info!("Starting price check cycle for {} products", products.len());

        for product in &products {
            summary.products_checked += 1;
            if let Err(e) = self.check_product(product, &mut summary).await {
                summary.failures += 1;
                error!("Failed to check {}: {}", product.url, e);
            }
        }

        info!(
            "Price check cycle complete: {} checked, {} snapshots, {} changes, {} notifications, {} failures",
            summary.products_checked,
            summary.snapshots_captured,
            summary.changes_detected,
            summary.notifications_sent,
            summary.failures
        );
        summary
    }

    async fn check_product(
        &self,
        product: &TrackedProduct,
        summary: &mut CycleSummary,
    ) -> crate::Result<()> {
        let scraper = self.registry.resolve(&product.url)?;

        let Some(snapshot) = scraper.scrape(&product.url).await? else {
            debug!("No result for {}", product.url);
            return Ok(());
        };
        summary.snapshots_captured += 1;

        let previous = product.current_price;
        self.store
            .update_price(product.id, snapshot.price, snapshot.captured_at)
            .await?;

        let Some(event) = self.detector.detect(previous, snapshot.price) else {
            return Ok(());
        };
        summary.changes_detected += 1;

        let alert = PriceAlert::new(product, &snapshot, &event);
        for subscriber in &product.subscribers {
            for notifier in &self.notifiers {
                match notifier.notify(subscriber, &alert).await {
                    Ok(()) => summary.notifications_sent += 1,
                    // Delivery is fire-and-forget; a dead transport must
                    // not take the cycle down with it.
                    Err(e) => warn!(
                        "{} notification to {} failed: {}",
                        notifier.name(),
                        subscriber,
                        e
                    ),
                }
            }
        }

        Ok(())
    }
}

/// Periodic driver around `CheckCycle`.
///
/// Triggers fire on a fixed minute schedule regardless of how long the
/// previous cycle took; a trigger that lands while a cycle is still running
/// is skipped (logged), never queued.
pub struct PriceCheckScheduler {
    scheduler: JobScheduler,
    cycle: Arc<CheckCycle>,
    interval_minutes: u32,
    running: Arc<AtomicBool>,
}

impl PriceCheckScheduler {
    pub async fn new(cycle: Arc<CheckCycle>, interval_minutes: u32) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            cycle,
            interval_minutes,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let expression = format!("0 */{} * * * *", self.interval_minutes);
        let cycle = Arc::clone(&self.cycle);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(expression.as_str(), move |_uuid, _lock| {
            let cycle = Arc::clone(&cycle);
            let running = Arc::clone(&running);

            Box::pin(async move {
                if running.swap(true, Ordering::SeqCst) {
                    warn!("Previous check cycle still running, skipping this trigger");
                    return;
                }
                cycle.run_once().await;
                running.store(false, Ordering::SeqCst);
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        info!(
            "Price check scheduler started, interval: {} minutes",
            self.interval_minutes
        );
        Ok(())
    }

    /// Run a cycle immediately (startup check). Returns `None` if a cycle
    /// is already in flight.
    pub async fn run_now(&self) -> Option<CycleSummary> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Check cycle already running, immediate run skipped");
            return None;
        }
        let summary = self.cycle.run_once().await;
        self.running.store(false, Ordering::SeqCst);
        Some(summary)
    }

    /// Stop scheduling and give an in-flight cycle a bounded window to
    /// finish closing its browser session.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while self.running.load(Ordering::SeqCst) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if self.running.load(Ordering::SeqCst) {
            warn!("Shutting down with a check cycle still in flight");
        }

        info!("Price check scheduler shutdown");
        Ok(())
    }
}
