//! Finance tests
//!
//! Property-based and unit tests for:
//! - Monthly summary arithmetic (revenue, expenses, net profit, average ticket)
//! - Month boundaries used by summaries and the dashboard
//! - Transaction input validation

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    validate_transaction_amount, FinanceSummary, LedgerEntry, Month, TransactionCategory,
    TransactionType,
};

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn entry(cents: i64, transaction_type: TransactionType, category: TransactionCategory) -> LedgerEntry {
    LedgerEntry {
        date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        amount: money(cents),
        transaction_type,
        category,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_month_boundaries() {
        let feb = Month::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let dec = Month::new(2023, 12).unwrap();
        assert_eq!(dec.last_day(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(Month::new(2024, 13).is_none());
        assert!(Month::new(2024, 0).is_none());
    }

    #[test]
    fn test_month_range_contains() {
        let range = Month::of(NaiveDate::from_ymd_opt(2024, 4, 18).unwrap()).range();
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()));
    }

    #[test]
    fn test_canceled_sale_nets_to_zero() {
        use TransactionCategory::*;
        use TransactionType::*;

        let summary = FinanceSummary::from_entries(&[
            entry(4500, Revenue, Sale),
            entry(-4500, Revenue, Sale),
        ]);
        assert_eq!(summary.revenue, Decimal::ZERO);
        assert_eq!(summary.net_profit, Decimal::ZERO);
    }

    #[test]
    fn test_average_ticket_rounds_to_cents() {
        use TransactionCategory::*;
        use TransactionType::*;

        let summary = FinanceSummary::from_entries(&[
            entry(1000, Revenue, Sale),
            entry(1000, Revenue, Sale),
            entry(1001, Revenue, Sale),
        ]);
        assert_eq!(summary.sale_count, 3);
        assert_eq!(summary.average_ticket, money(1000));
    }

    #[test]
    fn test_other_revenue_not_a_ticket() {
        use TransactionCategory::*;
        use TransactionType::*;

        let summary = FinanceSummary::from_entries(&[entry(2000, Revenue, Other)]);
        assert_eq!(summary.revenue, money(2000));
        assert_eq!(summary.sale_count, 0);
        assert_eq!(summary.average_ticket, Decimal::ZERO);
    }

    #[test]
    fn test_transaction_amount_validation() {
        assert!(validate_transaction_amount(money(1)).is_ok());
        assert!(validate_transaction_amount(Decimal::ZERO).is_err());
        assert!(validate_transaction_amount(money(-100)).is_err());
    }

    #[test]
    fn test_summary_serializes_for_api() {
        let summary = FinanceSummary::from_entries(&[entry(
            1250,
            TransactionType::Revenue,
            TransactionCategory::Sale,
        )]);
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["revenue"], "12.50");
        assert_eq!(json["sale_count"], 1);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn entry_strategy() -> impl Strategy<Value = LedgerEntry> {
        (
            -50_000i64..50_000,
            prop_oneof![Just(TransactionType::Revenue), Just(TransactionType::Expense)],
            prop_oneof![
                Just(TransactionCategory::Sale),
                Just(TransactionCategory::Purchase),
                Just(TransactionCategory::Other),
            ],
        )
            .prop_map(|(cents, t, c)| entry(cents, t, c))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Net profit is always revenue minus expenses
        #[test]
        fn prop_net_profit(entries in prop::collection::vec(entry_strategy(), 0..30)) {
            let summary = FinanceSummary::from_entries(&entries);
            prop_assert_eq!(summary.net_profit, summary.revenue - summary.expenses);
            prop_assert!(summary.expenses >= Decimal::ZERO);
        }

        /// Expenses never reduce revenue, and revenue entries never add to expenses
        #[test]
        fn prop_types_are_separate(entries in prop::collection::vec(entry_strategy(), 0..30)) {
            let summary = FinanceSummary::from_entries(&entries);
            let revenue: Decimal = entries
                .iter()
                .filter(|e| e.transaction_type == TransactionType::Revenue)
                .map(|e| e.amount)
                .sum();
            prop_assert_eq!(summary.revenue, revenue);
        }

        /// The average ticket lies between the smallest and largest sale
        #[test]
        fn prop_average_ticket_bounds(sales in prop::collection::vec(1i64..100_000, 1..20)) {
            let entries: Vec<LedgerEntry> = sales
                .iter()
                .map(|c| entry(*c, TransactionType::Revenue, TransactionCategory::Sale))
                .collect();
            let summary = FinanceSummary::from_entries(&entries);
            let min = money(*sales.iter().min().unwrap());
            let max = money(*sales.iter().max().unwrap());

            prop_assert_eq!(summary.sale_count as usize, sales.len());
            prop_assert!(summary.average_ticket >= min && summary.average_ticket <= max);
        }
    }
}
