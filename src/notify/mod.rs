pub mod email;
pub mod telegram;

use async_trait::async_trait;

use crate::change::PriceChangeEvent;
use crate::models::{ProductSnapshot, TrackedProduct};
use crate::utils::error::AppError;

pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

/// Delivery transport for price alerts. Fire-and-forget from the cycle's
/// point of view: errors are logged at the call site and never abort a
/// check cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    async fn notify(&self, subscriber: &str, alert: &PriceAlert) -> Result<(), AppError>;
}

/// Everything a transport needs to render an alert message.
#[derive(Debug, Clone)]
pub struct PriceAlert {
    pub product_name: String,
    pub url: String,
    pub previous_price: Option<f64>,
    pub new_price: f64,
    pub change_percent: f64,
}

impl PriceAlert {
    pub fn new(
        product: &TrackedProduct,
        snapshot: &ProductSnapshot,
        event: &PriceChangeEvent,
    ) -> Self {
        Self {
            product_name: product
                .name
                .clone()
                .unwrap_or_else(|| snapshot.name.clone()),
            url: product.url.clone(),
            previous_price: event.previous_price,
            new_price: event.new_price,
            change_percent: event.change_percent,
        }
    }

    /// One-line summary shared by the transports.
    pub fn headline(&self) -> String {
        match self.previous_price {
            None => format!("Now tracking {} at ${:.2}", self.product_name, self.new_price),
            Some(_) if self.change_percent.is_infinite() => {
                format!("{} is back at ${:.2}", self.product_name, self.new_price)
            }
            Some(previous) => format!(
                "{}: ${:.2} -> ${:.2} ({:+.2}%)",
                self.product_name, previous, self.new_price, self.change_percent
            ),
        }
    }
}
