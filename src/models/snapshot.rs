use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successfully captured reading for a product.
///
/// A snapshot is only ever built from price text that passed validation
/// (contains a digit, not a placeholder), so `price` is always a finite,
/// non-negative value. Snapshots are never mutated; a new reading produces
/// a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub item_number: String,
    pub name: String,
    pub price: f64,
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

impl ProductSnapshot {
    pub fn new(item_number: String, name: String, price: f64, url: String) -> Self {
        Self {
            item_number,
            name,
            price,
            url,
            captured_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_creation() {
        let snapshot = ProductSnapshot::new(
            "100123456".to_string(),
            "Kirkland Signature Organic Olive Oil".to_string(),
            24.99,
            "https://www.costco.ca/olive-oil.product.100123456.html".to_string(),
        );

        assert_eq!(snapshot.item_number, "100123456");
        assert_eq!(snapshot.price, 24.99);
        assert!(snapshot.captured_at <= Utc::now());
    }
}
