use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product under watch, as yielded by the product store.
///
/// `current_price` is the last price a check cycle persisted; `None` until
/// the first successful scrape. `subscribers` are opaque delivery addresses
/// (Telegram chat ids, email addresses) owned by the notification boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedProduct {
    pub id: i64,
    pub url: String,
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub last_checked: Option<DateTime<Utc>>,
    pub subscribers: Vec<String>,
}

/// One row of the price history kept alongside the current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_id: i64,
    pub price: f64,
    pub recorded_at: DateTime<Utc>,
}
