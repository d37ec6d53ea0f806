//! Stock item models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stock level classification for a product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Ok,
    Low,
    Critical,
}

impl StockStatus {
    /// Critical when quantity is at most 30% of the minimum, low when at most the minimum.
    pub fn classify(quantity: i32, min_quantity: i32) -> Self {
        let q = i64::from(quantity);
        let min = i64::from(min_quantity);
        if q * 10 <= min * 3 {
            StockStatus::Critical
        } else if q <= min {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::Ok => "ok",
            StockStatus::Low => "low",
            StockStatus::Critical => "critical",
        }
    }

    /// Whether the product should show up in low stock alerts
    pub fn needs_restock(&self) -> bool {
        !matches!(self, StockStatus::Ok)
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current on-hand quantity of a product, as read at the start of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_thresholds() {
        assert_eq!(StockStatus::classify(10, 5), StockStatus::Ok);
        assert_eq!(StockStatus::classify(5, 5), StockStatus::Low);
        assert_eq!(StockStatus::classify(2, 5), StockStatus::Low);
        assert_eq!(StockStatus::classify(1, 5), StockStatus::Critical);
        assert_eq!(StockStatus::classify(3, 10), StockStatus::Critical);
        assert_eq!(StockStatus::classify(4, 10), StockStatus::Low);
    }

    #[test]
    fn zero_minimum() {
        // With no minimum configured only an empty shelf is flagged
        assert_eq!(StockStatus::classify(0, 0), StockStatus::Critical);
        assert_eq!(StockStatus::classify(1, 0), StockStatus::Ok);
    }

    #[test]
    fn restock_flag() {
        assert!(!StockStatus::Ok.needs_restock());
        assert!(StockStatus::Low.needs_restock());
        assert!(StockStatus::Critical.needs_restock());
    }
}
