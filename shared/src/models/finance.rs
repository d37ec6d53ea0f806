//! Financial ledger models

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Revenue,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Revenue => "revenue",
            TransactionType::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revenue" => Ok(TransactionType::Revenue),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    Sale,
    Purchase,
    Other,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::Sale => "sale",
            TransactionCategory::Purchase => "purchase",
            TransactionCategory::Other => "other",
        }
    }
}

impl FromStr for TransactionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionCategory::Sale),
            "purchase" => Ok(TransactionCategory::Purchase),
            "other" => Ok(TransactionCategory::Other),
            other => Err(format!("Unknown transaction category: {}", other)),
        }
    }
}

/// Idempotency key guarding the sale recorded when an order becomes ready
pub fn order_sale_key(order_id: Uuid) -> String {
    format!("order:{}:sale", order_id)
}

/// Idempotency key guarding the offset recorded when an order is canceled
pub fn order_cancellation_key(order_id: Uuid) -> String {
    format!("order:{}:cancel", order_id)
}

/// Minimal view of a ledger row used for summaries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
}

/// Monthly financial summary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FinanceSummary {
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub average_ticket: Decimal,
    pub sale_count: u32,
}

impl FinanceSummary {
    /// Summarize ledger entries.
    ///
    /// Revenue sums every revenue entry, cancellation offsets included.
    /// Expenses are reported as a positive figure. The average ticket is the
    /// mean of positive sale revenue entries, rounded to cents.
    pub fn from_entries(entries: &[LedgerEntry]) -> Self {
        let mut summary = FinanceSummary::default();
        let mut ticket_total = Decimal::ZERO;

        for entry in entries {
            match entry.transaction_type {
                TransactionType::Revenue => {
                    summary.revenue += entry.amount;
                    if entry.category == TransactionCategory::Sale && entry.amount > Decimal::ZERO
                    {
                        ticket_total += entry.amount;
                        summary.sale_count += 1;
                    }
                }
                TransactionType::Expense => summary.expenses += entry.amount.abs(),
            }
        }

        summary.net_profit = summary.revenue - summary.expenses;
        if summary.sale_count > 0 {
            summary.average_ticket =
                (ticket_total / Decimal::from(summary.sale_count)).round_dp(2);
        }
        summary
    }
}
