//! Order models

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::combo::ComboComponent;

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    UnderReview,
    InProduction,
    Ready,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::UnderReview,
        OrderStatus::InProduction,
        OrderStatus::Ready,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::UnderReview => "under_review",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Ready => "ready",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Canceled orders cannot move to any other status
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Canceled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::UnderReview
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "under_review" => Ok(OrderStatus::UnderReview),
            "in_production" => Ok(OrderStatus::InProduction),
            "ready" => Ok(OrderStatus::Ready),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(format!("Unknown order status: {}", other)),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an order line refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LineItem {
    Product(Uuid),
    Combo(Uuid),
}

impl LineItem {
    pub fn from_parts(id: Uuid, is_combo: bool) -> Self {
        if is_combo {
            LineItem::Combo(id)
        } else {
            LineItem::Product(id)
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LineItem::Product(id) | LineItem::Combo(id) => *id,
        }
    }

    pub fn is_combo(&self) -> bool {
        matches!(self, LineItem::Combo(_))
    }
}

/// A requested order line, before it is priced or persisted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub item: LineItem,
    pub quantity: i32,
}

impl OrderLine {
    pub fn product(product_id: Uuid, quantity: i32) -> Self {
        Self {
            item: LineItem::Product(product_id),
            quantity,
        }
    }

    pub fn combo(combo_id: Uuid, quantity: i32) -> Self {
        Self {
            item: LineItem::Combo(combo_id),
            quantity,
        }
    }
}

/// A line as stored on an order.
///
/// `components` is the per-unit combo composition captured when the line was
/// written; it is empty for product lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedLine {
    pub item: LineItem,
    pub quantity: i32,
    pub components: Vec<ComboComponent>,
}

/// Price snapshot of a line used for totals
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Sum of price times quantity over all lines plus the delivery fee
pub fn order_total(lines: &[PricedLine], delivery_fee: Decimal) -> Decimal {
    lines
        .iter()
        .map(|l| l.unit_price * Decimal::from(l.quantity))
        .sum::<Decimal>()
        + delivery_fee
}

/// Human readable order code, e.g. `PED-0007`
pub fn format_order_code(order_number: i64) -> String {
    format!("PED-{:04}", order_number)
}
