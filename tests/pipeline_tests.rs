// End-to-end pipeline tests: a real SQLite store driven through full check
// cycles, with the browser-facing strategy replaced by scripted fakes.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex;

use pricewatch::change::ChangeDetector;
use pricewatch::models::ProductSnapshot;
use pricewatch::notify::{Notifier, PriceAlert};
use pricewatch::scheduler::CheckCycle;
use pricewatch::scrapers::{ProductScraper, ScraperRegistry};
use pricewatch::storage::{ProductStore, SqliteStore};
use pricewatch::AppError;

/// Returns the next scripted price on every scrape call.
struct ScriptedScraper {
    prices: Mutex<Vec<Option<f64>>>,
}

impl ScriptedScraper {
    fn new(prices: Vec<Option<f64>>) -> Self {
        Self {
            prices: Mutex::new(prices),
        }
    }
}

#[async_trait]
impl ProductScraper for ScriptedScraper {
    fn name(&self) -> &str {
        "scripted"
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains("shop.example")
    }

    async fn scrape(&self, url: &str) -> Result<Option<ProductSnapshot>, AppError> {
        let mut prices = self.prices.lock().await;
        match prices.remove(0) {
            Some(price) => Ok(Some(ProductSnapshot::new(
                "100000001".to_string(),
                "Fixture Product".to_string(),
                price,
                url.to_string(),
            ))),
            None => Ok(None),
        }
    }
}

struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, subscriber: &str, alert: &PriceAlert) -> Result<(), AppError> {
        self.sent
            .lock()
            .await
            .push((subscriber.to_string(), alert.headline()));
        Ok(())
    }
}

async fn sqlite_store() -> Arc<SqliteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::new(pool);
    store.migrate().await.unwrap();
    Arc::new(store)
}

fn cycle_with(
    store: Arc<SqliteStore>,
    scraper: Box<dyn ProductScraper>,
    notifier: Arc<RecordingNotifier>,
    threshold: f64,
) -> CheckCycle {
    let mut registry = ScraperRegistry::new();
    registry.register(scraper);

    CheckCycle::new(
        Arc::new(registry),
        store as Arc<dyn ProductStore>,
        vec![notifier as Arc<dyn Notifier>],
        ChangeDetector::new(threshold),
    )
}

#[tokio::test]
async fn test_first_observation_persists_and_notifies() {
    let store = sqlite_store().await;
    let id = store
        .add_product("https://shop.example/item.product.100000001.html", None)
        .await
        .unwrap();
    store.subscribe(id, "111").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let cycle = cycle_with(
        Arc::clone(&store),
        Box::new(ScriptedScraper::new(vec![Some(24.99)])),
        Arc::clone(&notifier),
        5.0,
    );

    let summary = cycle.run_once().await;
    assert_eq!(summary.products_checked, 1);
    assert_eq!(summary.snapshots_captured, 1);
    assert_eq!(summary.changes_detected, 1);
    assert_eq!(summary.notifications_sent, 1);

    let products = store.list_tracked_products().await.unwrap();
    assert_eq!(products[0].current_price, Some(24.99));
    assert_eq!(store.price_history(id).await.unwrap().len(), 1);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent[0].0, "111");
    assert!(sent[0].1.contains("Now tracking"));
}

#[tokio::test]
async fn test_threshold_crossing_over_two_cycles() {
    let store = sqlite_store().await;
    let id = store
        .add_product("https://shop.example/item.product.100000001.html", None)
        .await
        .unwrap();
    store.subscribe(id, "111").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let cycle = cycle_with(
        Arc::clone(&store),
        // cycle 1: baseline; cycle 2: -20%
        Box::new(ScriptedScraper::new(vec![Some(100.0), Some(80.0)])),
        Arc::clone(&notifier),
        5.0,
    );

    cycle.run_once().await;
    let summary = cycle.run_once().await;

    assert_eq!(summary.changes_detected, 1);
    let products = store.list_tracked_products().await.unwrap();
    assert_eq!(products[0].current_price, Some(80.0));
    assert_eq!(store.price_history(id).await.unwrap().len(), 2);

    let sent = notifier.sent.lock().await;
    assert_eq!(sent.len(), 2); // first observation + the drop
    assert!(sent[1].1.contains("-20.00%"));
}

#[tokio::test]
async fn test_small_move_updates_store_silently() {
    let store = sqlite_store().await;
    let id = store
        .add_product("https://shop.example/item.product.100000001.html", None)
        .await
        .unwrap();
    store.subscribe(id, "111").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let cycle = cycle_with(
        Arc::clone(&store),
        Box::new(ScriptedScraper::new(vec![Some(100.0), Some(104.9)])),
        Arc::clone(&notifier),
        5.0,
    );

    cycle.run_once().await;
    let summary = cycle.run_once().await;

    assert_eq!(summary.changes_detected, 0);
    assert_eq!(summary.notifications_sent, 0);

    // The price still advanced so the next comparison uses 104.9
    let products = store.list_tracked_products().await.unwrap();
    assert_eq!(products[0].current_price, Some(104.9));
    assert_eq!(notifier.sent.lock().await.len(), 1); // only the first observation
}

#[tokio::test]
async fn test_unavailable_price_preserves_last_known_value() {
    let store = sqlite_store().await;
    let id = store
        .add_product("https://shop.example/item.product.100000001.html", None)
        .await
        .unwrap();
    store.subscribe(id, "111").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let cycle = cycle_with(
        Arc::clone(&store),
        // cycle 1: a price; cycle 2: item goes member-only / out of stock
        Box::new(ScriptedScraper::new(vec![Some(49.99), None])),
        Arc::clone(&notifier),
        0.0,
    );

    cycle.run_once().await;
    let summary = cycle.run_once().await;

    assert_eq!(summary.snapshots_captured, 0);
    assert_eq!(summary.failures, 0);

    let products = store.list_tracked_products().await.unwrap();
    assert_eq!(products[0].current_price, Some(49.99));
    assert_eq!(store.price_history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unhandled_product_fails_without_stopping_others() {
    let store = sqlite_store().await;
    let foreign = store
        .add_product("https://other.example/item.html", None)
        .await
        .unwrap();
    let handled = store
        .add_product("https://shop.example/item.product.100000001.html", None)
        .await
        .unwrap();
    store.subscribe(foreign, "111").await.unwrap();
    store.subscribe(handled, "111").await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let cycle = cycle_with(
        Arc::clone(&store),
        Box::new(ScriptedScraper::new(vec![Some(9.99)])),
        Arc::clone(&notifier),
        0.0,
    );

    let summary = cycle.run_once().await;

    // No strategy claims other.example: loud failure, cycle continues
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.snapshots_captured, 1);

    let products = store.list_tracked_products().await.unwrap();
    let handled_product = products.iter().find(|p| p.id == handled).unwrap();
    assert_eq!(handled_product.current_price, Some(9.99));
}
