use serde::Serialize;

/// A notification-worthy price movement for one product in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChangeEvent {
    /// `None` on the first observation of a product.
    pub previous_price: Option<f64>,
    pub new_price: f64,
    /// Signed percentage relative to the previous price. Zero for a first
    /// observation; positive infinity when the previous price was zero.
    pub change_percent: f64,
}

/// Compares a fresh price against the last stored one.
///
/// `detect` returns `Some` only when the movement is worth notifying:
/// - a first observation always is;
/// - an unchanged price never is, whatever the threshold;
/// - a previous price of zero makes the relative change undefined, so any
///   movement away from zero is treated as infinite and always notifies;
/// - otherwise the absolute percentage must meet the threshold.
pub struct ChangeDetector {
    threshold_percent: f64,
}

impl ChangeDetector {
    /// `threshold_percent` is a non-negative percentage; zero means notify
    /// on any numeric change.
    pub fn new(threshold_percent: f64) -> Self {
        Self {
            threshold_percent: threshold_percent.max(0.0),
        }
    }

    pub fn detect(&self, previous: Option<f64>, current: f64) -> Option<PriceChangeEvent> {
        let Some(previous) = previous else {
            return Some(PriceChangeEvent {
                previous_price: None,
                new_price: current,
                change_percent: 0.0,
            });
        };

        if current == previous {
            return None;
        }

        let change_percent = if previous == 0.0 {
            f64::INFINITY
        } else {
            (current - previous) / previous * 100.0
        };

        if change_percent.abs() >= self.threshold_percent {
            Some(PriceChangeEvent {
                previous_price: Some(previous),
                new_price: current,
                change_percent,
            })
        } else {
            None
        }
    }
}
