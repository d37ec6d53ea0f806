//! Order workflow tests
//!
//! Property-based and unit tests for order placement, editing and status
//! changes. An in-memory shop drives the same fulfillment rules the order
//! service runs inside its database transaction:
//! - Placement is all-or-nothing
//! - Combo lines expand into their components, merged additively
//! - Cancellation restores stock exactly once
//! - Ready records exactly one sale per order
//! - Order total equals line subtotals plus delivery fee

use std::collections::{BTreeMap, HashMap};

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    check_editable, check_initial_status, consumption_for_persisted, consumption_for_snapshots,
    order_cancellation_key, order_sale_key, plan_transition, project_consumption, reconcile_edit,
    snapshot_lines, snapshot_total, Catalog, CatalogCombo, CatalogProduct, ComboComponent,
    FulfillmentError, FulfillmentResult, OrderLine, OrderStatus, PersistedLine, StockLevel,
    StockStatus,
};
use uuid::Uuid;

// ============================================================================
// In-memory shop
// ============================================================================

#[derive(Debug, Clone)]
struct StoredOrder {
    status: OrderStatus,
    lines: Vec<PersistedLine>,
    total: Decimal,
}

#[derive(Debug, Default)]
struct Shop {
    catalog: Catalog,
    stock: HashMap<Uuid, StockLevel>,
    min_quantity: HashMap<Uuid, i32>,
    orders: HashMap<Uuid, StoredOrder>,
    ledger: BTreeMap<String, Decimal>,
}

impl Shop {
    fn add_product(&mut self, name: &str, price: Decimal, quantity: i32, min_quantity: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog.insert_product(
            id,
            CatalogProduct {
                name: name.to_string(),
                price,
            },
        );
        self.stock.insert(
            id,
            StockLevel {
                product_id: id,
                name: name.to_string(),
                quantity,
            },
        );
        self.min_quantity.insert(id, min_quantity);
        id
    }

    fn add_combo(&mut self, name: &str, price: Decimal, components: Vec<ComboComponent>) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog.insert_combo(
            id,
            CatalogCombo {
                name: name.to_string(),
                price,
                components,
            },
        );
        id
    }

    fn quantity(&self, product_id: Uuid) -> i32 {
        self.stock[&product_id].quantity
    }

    fn status_of(&self, product_id: Uuid) -> StockStatus {
        StockStatus::classify(self.quantity(product_id), self.min_quantity[&product_id])
    }

    fn quantities(&self) -> BTreeMap<Uuid, i32> {
        self.stock.iter().map(|(id, level)| (*id, level.quantity)).collect()
    }

    fn write(&mut self, projected: BTreeMap<Uuid, i32>) {
        for (id, quantity) in projected {
            if let Some(level) = self.stock.get_mut(&id) {
                level.quantity = quantity;
            }
        }
    }

    fn place(
        &mut self,
        lines: &[OrderLine],
        delivery_fee: Decimal,
        status: OrderStatus,
    ) -> FulfillmentResult<Uuid> {
        check_initial_status(status)?;
        let snapshots = snapshot_lines(lines, &self.catalog)?;
        let consumption = consumption_for_snapshots(&snapshots)?;
        let projected = project_consumption(&self.stock, &consumption)?;
        self.write(projected);

        let id = Uuid::new_v4();
        self.orders.insert(
            id,
            StoredOrder {
                status,
                lines: snapshots.iter().map(|s| s.line.clone()).collect(),
                total: snapshot_total(&snapshots, delivery_fee),
            },
        );
        if status == OrderStatus::Ready {
            self.record_sale(id);
        }
        Ok(id)
    }

    fn edit(&mut self, id: Uuid, lines: &[OrderLine], delivery_fee: Decimal) -> FulfillmentResult<()> {
        let order = self.orders[&id].clone();
        check_editable(order.status)?;
        let snapshots = snapshot_lines(lines, &self.catalog)?;
        let delta = reconcile_edit(&order.lines, &snapshots)?;
        let projected = project_consumption(&self.stock, &delta)?;
        self.write(projected);

        let total = snapshot_total(&snapshots, delivery_fee);
        let stored = self.orders.get_mut(&id).unwrap();
        stored.lines = snapshots.into_iter().map(|s| s.line).collect();
        stored.total = total;

        if order.status == OrderStatus::Ready {
            if let Some(sale) = self.ledger.get_mut(&order_sale_key(id)) {
                *sale = total;
            }
        }
        Ok(())
    }

    fn set_status(&mut self, id: Uuid, to: OrderStatus) -> FulfillmentResult<()> {
        let order = self.orders[&id].clone();
        let plan = plan_transition(order.status, to)?;
        if plan.is_noop() {
            return Ok(());
        }

        if plan.restore_stock {
            let restore = consumption_for_persisted(&order.lines)?.negate()?;
            let projected = project_consumption(&self.stock, &restore)?;
            self.write(projected);
        }
        self.orders.get_mut(&id).unwrap().status = to;

        if plan.record_sale {
            self.record_sale(id);
        }
        if plan.offset_sale {
            if let Some(sale) = self.ledger.get(&order_sale_key(id)).copied() {
                self.ledger.entry(order_cancellation_key(id)).or_insert(-sale);
            }
        }
        Ok(())
    }

    fn record_sale(&mut self, id: Uuid) {
        let total = self.orders[&id].total;
        self.ledger.entry(order_sale_key(id)).or_insert(total);
    }

    fn revenue(&self) -> Decimal {
        self.ledger.values().copied().sum()
    }
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_place_then_cancel_restores_stock_and_status() {
        let mut shop = Shop::default();
        let a = shop.add_product("Brigadeiro", money(250), 10, 5);
        assert_eq!(shop.status_of(a), StockStatus::Ok);

        let order = shop
            .place(&[OrderLine::product(a, 8)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();
        assert_eq!(shop.quantity(a), 2);
        assert_eq!(shop.status_of(a), StockStatus::Low);

        shop.set_status(order, OrderStatus::Canceled).unwrap();
        assert_eq!(shop.quantity(a), 10);
        assert_eq!(shop.status_of(a), StockStatus::Ok);
    }

    #[test]
    fn test_combo_shortfall_rejects_whole_order() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(500), 10, 0);
        let b = shop.add_product("B", money(300), 1, 0);
        let family = shop.add_combo(
            "Family",
            money(2000),
            vec![ComboComponent::new(a, 2), ComboComponent::new(b, 1)],
        );

        let err = shop
            .place(&[OrderLine::combo(family, 2)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap_err();

        assert_eq!(
            err,
            FulfillmentError::InsufficientStock {
                product_id: b,
                product_name: "B".to_string(),
                required: 2,
                available: 1,
            }
        );
        assert_eq!(shop.quantity(a), 10);
        assert_eq!(shop.quantity(b), 1);
        assert!(shop.orders.is_empty());
    }

    #[test]
    fn test_product_and_combo_lines_share_stock() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(500), 5, 0);
        let b = shop.add_product("B", money(300), 5, 0);
        let family = shop.add_combo(
            "Family",
            money(2000),
            vec![ComboComponent::new(a, 2), ComboComponent::new(b, 1)],
        );

        // 2 direct + 2x2 via combo = 6 > 5
        let err = shop.place(
            &[OrderLine::product(a, 2), OrderLine::combo(family, 2)],
            Decimal::ZERO,
            OrderStatus::UnderReview,
        );
        assert!(matches!(err, Err(FulfillmentError::InsufficientStock { .. })));
        assert_eq!(shop.quantity(a), 5);
    }

    #[test]
    fn test_ready_twice_records_one_sale() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 2)], money(500), OrderStatus::InProduction)
            .unwrap();

        shop.set_status(order, OrderStatus::Ready).unwrap();
        shop.set_status(order, OrderStatus::InProduction).unwrap();
        shop.set_status(order, OrderStatus::Ready).unwrap();

        assert_eq!(shop.ledger.len(), 1);
        assert_eq!(shop.ledger[&order_sale_key(order)], money(2500));
    }

    #[test]
    fn test_cancel_ready_order_offsets_sale() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 3)], Decimal::ZERO, OrderStatus::Ready)
            .unwrap();
        assert_eq!(shop.revenue(), money(3000));

        shop.set_status(order, OrderStatus::Canceled).unwrap();
        assert_eq!(shop.ledger[&order_cancellation_key(order)], money(-3000));
        assert_eq!(shop.revenue(), Decimal::ZERO);
        assert_eq!(shop.quantity(a), 10);
    }

    #[test]
    fn test_cancel_without_sale_records_nothing() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 3)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();

        shop.set_status(order, OrderStatus::Canceled).unwrap();
        assert!(shop.ledger.is_empty());
    }

    #[test]
    fn test_canceled_is_terminal() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 3)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();
        shop.set_status(order, OrderStatus::Canceled).unwrap();

        // repeating the cancel changes nothing
        shop.set_status(order, OrderStatus::Canceled).unwrap();
        assert_eq!(shop.quantity(a), 10);

        assert!(matches!(
            shop.set_status(order, OrderStatus::Ready),
            Err(FulfillmentError::InvalidTransition { .. })
        ));
        assert!(shop.edit(order, &[OrderLine::product(a, 1)], Decimal::ZERO).is_err());
    }

    #[test]
    fn test_create_as_canceled_rejected() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        assert!(shop
            .place(&[OrderLine::product(a, 1)], Decimal::ZERO, OrderStatus::Canceled)
            .is_err());
        assert_eq!(shop.quantity(a), 10);
    }

    #[test]
    fn test_edit_reconciles_by_difference() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(100), 10, 0);
        let b = shop.add_product("B", money(200), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 4)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();
        assert_eq!(shop.quantity(a), 6);

        // drop A to 1, add 3 B
        shop.edit(order, &[OrderLine::product(a, 1), OrderLine::product(b, 3)], money(500))
            .unwrap();
        assert_eq!(shop.quantity(a), 9);
        assert_eq!(shop.quantity(b), 7);
        assert_eq!(shop.orders[&order].total, money(100 + 600 + 500));
    }

    #[test]
    fn test_edit_exceeding_stock_leaves_order_untouched() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(100), 5, 0);
        let order = shop
            .place(&[OrderLine::product(a, 3)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();

        let err = shop.edit(order, &[OrderLine::product(a, 6)], Decimal::ZERO);
        assert!(matches!(err, Err(FulfillmentError::InsufficientStock { required: 3, available: 2, .. })));
        assert_eq!(shop.quantity(a), 2);
        assert_eq!(shop.orders[&order].lines[0].quantity, 3);
    }

    #[test]
    fn test_edit_ready_order_updates_sale() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(1000), 10, 0);
        let order = shop
            .place(&[OrderLine::product(a, 1)], Decimal::ZERO, OrderStatus::Ready)
            .unwrap();
        shop.edit(order, &[OrderLine::product(a, 2)], Decimal::ZERO).unwrap();
        assert_eq!(shop.ledger[&order_sale_key(order)], money(2000));
    }

    #[test]
    fn test_cancel_uses_snapshot_after_combo_redefined() {
        let mut shop = Shop::default();
        let a = shop.add_product("A", money(100), 10, 0);
        let b = shop.add_product("B", money(100), 10, 0);
        let combo = shop.add_combo("Box", money(500), vec![ComboComponent::new(a, 2)]);
        let order = shop
            .place(&[OrderLine::combo(combo, 2)], Decimal::ZERO, OrderStatus::UnderReview)
            .unwrap();
        assert_eq!(shop.quantity(a), 6);

        shop.catalog.insert_combo(
            combo,
            CatalogCombo {
                name: "Box".to_string(),
                price: money(500),
                components: vec![ComboComponent::new(b, 1)],
            },
        );

        shop.set_status(order, OrderStatus::Canceled).unwrap();
        assert_eq!(shop.quantity(a), 10);
        assert_eq!(shop.quantity(b), 10);
    }

    #[test]
    fn test_unknown_items_rejected() {
        let mut shop = Shop::default();
        let missing = Uuid::new_v4();
        assert_eq!(
            shop.place(&[OrderLine::combo(missing, 1)], Decimal::ZERO, OrderStatus::UnderReview),
            Err(FulfillmentError::ComboNotFound(missing))
        );
        assert_eq!(
            shop.place(&[OrderLine::product(missing, 1)], Decimal::ZERO, OrderStatus::UnderReview),
            Err(FulfillmentError::ProductNotFound(missing))
        );
        assert_eq!(
            shop.place(&[], Decimal::ZERO, OrderStatus::UnderReview),
            Err(FulfillmentError::EmptyOrder)
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    const PRODUCTS: usize = 3;

    /// A shop with three products and one combo over the first two
    fn shop_with(quantities: &[i32], combo_parts: (i32, i32)) -> (Shop, Vec<Uuid>, Uuid) {
        let mut shop = Shop::default();
        let ids: Vec<Uuid> = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| shop.add_product(&format!("P{}", i), money(100 * (i as i64 + 1)), *q, 2))
            .collect();
        let combo = shop.add_combo(
            "Combo",
            money(1500),
            vec![
                ComboComponent::new(ids[0], combo_parts.0),
                ComboComponent::new(ids[1], combo_parts.1),
            ],
        );
        (shop, ids, combo)
    }

    /// (index into products, or PRODUCTS for the combo; quantity)
    fn lines_strategy() -> impl Strategy<Value = Vec<(usize, i32)>> {
        prop::collection::vec((0..=PRODUCTS, 1i32..6), 1..5)
    }

    fn to_lines(picks: &[(usize, i32)], ids: &[Uuid], combo: Uuid) -> Vec<OrderLine> {
        picks.iter()
            .map(|(idx, qty)| {
                if *idx == PRODUCTS {
                    OrderLine::combo(combo, *qty)
                } else {
                    OrderLine::product(ids[*idx], *qty)
                }
            })
            .collect()
    }

    fn expected_usage(picks: &[(usize, i32)], combo_parts: (i32, i32)) -> [i32; PRODUCTS] {
        let mut usage = [0; PRODUCTS];
        for (idx, qty) in picks {
            if *idx == PRODUCTS {
                usage[0] += combo_parts.0 * qty;
                usage[1] += combo_parts.1 * qty;
            } else {
                usage[*idx] += qty;
            }
        }
        usage
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Placement either applies the full consumption or nothing at all
        #[test]
        fn prop_placement_all_or_nothing(
            quantities in prop::collection::vec(0i32..25, PRODUCTS),
            parts in (1i32..4, 1i32..4),
            picks in lines_strategy(),
        ) {
            let (mut shop, ids, combo) = shop_with(&quantities, parts);
            let before = shop.quantities();
            let usage = expected_usage(&picks, parts);
            let fits = (0..PRODUCTS).all(|i| usage[i] <= quantities[i]);

            let result = shop.place(&to_lines(&picks, &ids, combo), Decimal::ZERO, OrderStatus::UnderReview);

            prop_assert_eq!(result.is_ok(), fits);
            for (i, id) in ids.iter().enumerate() {
                if fits {
                    prop_assert_eq!(shop.quantity(*id), quantities[i] - usage[i]);
                } else {
                    prop_assert_eq!(shop.quantity(*id), before[id]);
                }
                prop_assert!(shop.quantity(*id) >= 0);
            }
        }

        /// Cancelling an order returns stock to its pre-placement levels, once
        #[test]
        fn prop_cancel_restores_stock(
            parts in (1i32..4, 1i32..4),
            picks in lines_strategy(),
        ) {
            let (mut shop, ids, combo) = shop_with(&[100, 100, 100], parts);
            let before = shop.quantities();

            let order = shop.place(&to_lines(&picks, &ids, combo), Decimal::ZERO, OrderStatus::InProduction).unwrap();
            shop.set_status(order, OrderStatus::Canceled).unwrap();
            prop_assert_eq!(shop.quantities(), before.clone());

            shop.set_status(order, OrderStatus::Canceled).unwrap();
            prop_assert_eq!(shop.quantities(), before);
        }

        /// Any sequence of non-terminal moves records at most one sale
        #[test]
        fn prop_single_sale_per_order(
            moves in prop::collection::vec(
                prop_oneof![
                    Just(OrderStatus::UnderReview),
                    Just(OrderStatus::InProduction),
                    Just(OrderStatus::Ready),
                ],
                1..10,
            ),
        ) {
            let (mut shop, ids, _) = shop_with(&[50, 50, 50], (1, 1));
            let order = shop.place(&[OrderLine::product(ids[2], 2)], money(300), OrderStatus::UnderReview).unwrap();

            for status in &moves {
                shop.set_status(order, *status).unwrap();
            }

            let sales = shop.ledger.keys().filter(|k| **k == order_sale_key(order)).count();
            let reached_ready = moves.contains(&OrderStatus::Ready);
            prop_assert_eq!(sales, usize::from(reached_ready));
            if reached_ready {
                prop_assert_eq!(shop.ledger[&order_sale_key(order)], shop.orders[&order].total);
            }
        }

        /// Total equals line subtotals plus fee after create and after edit
        #[test]
        fn prop_total_invariant(
            parts in (1i32..4, 1i32..4),
            first in lines_strategy(),
            second in lines_strategy(),
            fee_cents in 0i64..2000,
        ) {
            let (mut shop, ids, combo) = shop_with(&[500, 500, 500], parts);
            let fee = money(fee_cents);

            let expected = |picks: &[(usize, i32)]| -> Decimal {
                picks.iter()
                    .map(|(idx, qty)| {
                        let price = if *idx == PRODUCTS { money(1500) } else { money(100 * (*idx as i64 + 1)) };
                        price * Decimal::from(*qty)
                    })
                    .sum::<Decimal>()
                    + fee
            };

            let order = shop.place(&to_lines(&first, &ids, combo), fee, OrderStatus::UnderReview).unwrap();
            prop_assert_eq!(shop.orders[&order].total, expected(first.as_slice()));

            shop.edit(order, &to_lines(&second, &ids, combo), fee).unwrap();
            prop_assert_eq!(shop.orders[&order].total, expected(second.as_slice()));
        }

        /// After an edit, stock reflects only the new lines
        #[test]
        fn prop_edit_reconciliation(
            parts in (1i32..4, 1i32..4),
            first in lines_strategy(),
            second in lines_strategy(),
        ) {
            let (mut shop, ids, combo) = shop_with(&[200, 200, 200], parts);
            let order = shop.place(&to_lines(&first, &ids, combo), Decimal::ZERO, OrderStatus::UnderReview).unwrap();
            shop.edit(order, &to_lines(&second, &ids, combo), Decimal::ZERO).unwrap();

            let usage = expected_usage(&second, parts);
            for (i, id) in ids.iter().enumerate() {
                prop_assert_eq!(shop.quantity(*id), 200 - usage[i]);
            }
        }
    }
}
