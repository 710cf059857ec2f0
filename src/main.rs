use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use pricewatch::change::ChangeDetector;
use pricewatch::notify::{EmailNotifier, Notifier, TelegramNotifier};
use pricewatch::scheduler::{CheckCycle, PriceCheckScheduler};
use pricewatch::scrapers::{CostcoScraper, ScraperRegistry};
use pricewatch::storage::{ProductStore, SqliteStore};
use pricewatch::AppConfig;

#[derive(Parser)]
#[command(name = "pricewatch", about = "Warehouse-store price tracking daemon")]
struct Cli {
    /// Run a single check cycle and exit instead of scheduling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    info!("Starting pricewatch...");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    let store = SqliteStore::new(pool);
    store.migrate().await?;

    let mut registry = ScraperRegistry::new();
    registry.register(Box::new(CostcoScraper::new(&config)?));

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(telegram) = &config.notifications.telegram {
        notifiers.push(Arc::new(TelegramNotifier::new(telegram.bot_token.clone())));
    }
    if let Some(smtp) = &config.notifications.smtp {
        notifiers.push(Arc::new(EmailNotifier::new(smtp)?));
    }
    if notifiers.is_empty() {
        info!("No notification transport configured; changes will only be logged");
    }

    let detector = ChangeDetector::new(config.tracking.price_change_threshold_percent);
    let cycle = Arc::new(CheckCycle::new(
        Arc::new(registry),
        Arc::new(store) as Arc<dyn ProductStore>,
        notifiers,
        detector,
    ));

    if cli.once {
        cycle.run_once().await;
        return Ok(());
    }

    let mut scheduler =
        PriceCheckScheduler::new(Arc::clone(&cycle), config.tracking.check_interval_minutes)
            .await?;

    // First pass right away; the cron schedule takes over from there
    scheduler.run_now().await;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    scheduler.shutdown().await?;

    Ok(())
}
