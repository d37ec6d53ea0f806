//! Order fulfillment rules
//!
//! Pure functions behind order placement, editing and status changes: combo
//! expansion, consolidated stock requirements, the stock check, edit
//! reconciliation and the side effects a status transition triggers. The
//! backend runs these inside a database transaction; nothing here does I/O.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    order_total, ComboComponent, LineItem, OrderLine, OrderStatus, PersistedLine, PricedLine,
    StockLevel,
};

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FulfillmentError {
    #[error("Combo not found: {0}")]
    ComboNotFound(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Insufficient stock for {product_name}: required {required}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        required: i32,
        available: i32,
    },

    #[error("Quantity must be greater than zero, got {quantity}")]
    InvalidQuantity { quantity: i32 },

    #[error("Quantity is too large")]
    QuantityOverflow,

    #[error("An order needs at least one item")]
    EmptyOrder,

    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCombo {
    pub name: String,
    pub price: Decimal,
    pub components: Vec<ComboComponent>,
}

/// The products and combos an order may reference, as currently defined
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<Uuid, CatalogProduct>,
    combos: HashMap<Uuid, CatalogCombo>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&mut self, id: Uuid, product: CatalogProduct) {
        self.products.insert(id, product);
    }

    pub fn insert_combo(&mut self, id: Uuid, combo: CatalogCombo) {
        self.combos.insert(id, combo);
    }

    pub fn product(&self, id: Uuid) -> FulfillmentResult<&CatalogProduct> {
        self.products
            .get(&id)
            .ok_or(FulfillmentError::ProductNotFound(id))
    }

    pub fn combo(&self, id: Uuid) -> FulfillmentResult<&CatalogCombo> {
        self.combos.get(&id).ok_or(FulfillmentError::ComboNotFound(id))
    }
}

// ============================================================================
// Stock deltas
// ============================================================================

/// Signed per-product stock change. Positive values consume stock, negative
/// values return it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta(BTreeMap<Uuid, i32>);

impl StockDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, product_id: Uuid, quantity: i32) -> FulfillmentResult<()> {
        let entry = self.0.entry(product_id).or_insert(0);
        *entry = entry
            .checked_add(quantity)
            .ok_or(FulfillmentError::QuantityOverflow)?;
        Ok(())
    }

    pub fn merge(&mut self, other: &StockDelta) -> FulfillmentResult<()> {
        for (product_id, quantity) in other.iter() {
            self.add(product_id, quantity)?;
        }
        Ok(())
    }

    pub fn negate(&self) -> FulfillmentResult<StockDelta> {
        let mut negated = BTreeMap::new();
        for (&product_id, &quantity) in &self.0 {
            let value = quantity
                .checked_neg()
                .ok_or(FulfillmentError::QuantityOverflow)?;
            negated.insert(product_id, value);
        }
        Ok(StockDelta(negated))
    }

    /// Drop entries that net out to zero
    pub fn normalized(mut self) -> Self {
        self.0.retain(|_, quantity| *quantity != 0);
        self
    }

    pub fn get(&self, product_id: &Uuid) -> i32 {
        self.0.get(product_id).copied().unwrap_or(0)
    }

    /// Entries in ascending product id order, which is also the row lock order
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, i32)> + '_ {
        self.0.iter().map(|(id, quantity)| (*id, *quantity))
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.0.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ============================================================================
// Combo expansion and consumption
// ============================================================================

/// Multiply per-combo component quantities by `multiplier`
pub fn scale_components(
    components: &[ComboComponent],
    multiplier: i32,
) -> FulfillmentResult<Vec<ComboComponent>> {
    components
        .iter()
        .map(|c| {
            c.quantity
                .checked_mul(multiplier)
                .map(|quantity| ComboComponent::new(c.product_id, quantity))
                .ok_or(FulfillmentError::QuantityOverflow)
        })
        .collect()
}

/// Product requirements for `multiplier` units of a combo, in component order
pub fn expand_combo(
    catalog: &Catalog,
    combo_id: Uuid,
    multiplier: i32,
) -> FulfillmentResult<Vec<ComboComponent>> {
    let combo = catalog.combo(combo_id)?;
    scale_components(&combo.components, multiplier)
}

fn add_line(
    delta: &mut StockDelta,
    item: LineItem,
    quantity: i32,
    components: &[ComboComponent],
) -> FulfillmentResult<()> {
    match item {
        LineItem::Product(product_id) => delta.add(product_id, quantity),
        LineItem::Combo(_) => {
            for component in scale_components(components, quantity)? {
                delta.add(component.product_id, component.quantity)?;
            }
            Ok(())
        }
    }
}

/// Consolidated stock consumption of requested lines, using current combo definitions
pub fn consumption_for_lines(lines: &[OrderLine], catalog: &Catalog) -> FulfillmentResult<StockDelta> {
    let mut delta = StockDelta::new();
    for line in lines {
        match line.item {
            LineItem::Product(_) => add_line(&mut delta, line.item, line.quantity, &[])?,
            LineItem::Combo(combo_id) => {
                let combo = catalog.combo(combo_id)?;
                add_line(&mut delta, line.item, line.quantity, &combo.components)?;
            }
        }
    }
    Ok(delta)
}

/// Consolidated stock consumption of stored lines, using their component snapshots
pub fn consumption_for_persisted<'a, I>(lines: I) -> FulfillmentResult<StockDelta>
where
    I: IntoIterator<Item = &'a PersistedLine>,
{
    let mut delta = StockDelta::new();
    for line in lines {
        add_line(&mut delta, line.item, line.quantity, &line.components)?;
    }
    Ok(delta)
}

// ============================================================================
// Snapshots and totals
// ============================================================================

/// A line priced and frozen against the catalog, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub line: PersistedLine,
    pub name: String,
    pub unit_price: Decimal,
}

impl LineSnapshot {
    pub fn priced(&self) -> PricedLine {
        PricedLine {
            unit_price: self.unit_price,
            quantity: self.line.quantity,
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.line.quantity)
    }
}

/// Validate requested lines and capture name, price and combo composition
pub fn snapshot_lines(lines: &[OrderLine], catalog: &Catalog) -> FulfillmentResult<Vec<LineSnapshot>> {
    if lines.is_empty() {
        return Err(FulfillmentError::EmptyOrder);
    }

    lines
        .iter()
        .map(|line| {
            if line.quantity <= 0 {
                return Err(FulfillmentError::InvalidQuantity {
                    quantity: line.quantity,
                });
            }
            let snapshot = match line.item {
                LineItem::Product(id) => {
                    let product = catalog.product(id)?;
                    LineSnapshot {
                        line: PersistedLine {
                            item: line.item,
                            quantity: line.quantity,
                            components: Vec::new(),
                        },
                        name: product.name.clone(),
                        unit_price: product.price,
                    }
                }
                LineItem::Combo(id) => {
                    let combo = catalog.combo(id)?;
                    LineSnapshot {
                        line: PersistedLine {
                            item: line.item,
                            quantity: line.quantity,
                            components: combo.components.clone(),
                        },
                        name: combo.name.clone(),
                        unit_price: combo.price,
                    }
                }
            };
            Ok(snapshot)
        })
        .collect()
}

/// Order total from snapshot prices plus the delivery fee
pub fn snapshot_total(snapshots: &[LineSnapshot], delivery_fee: Decimal) -> Decimal {
    let priced: Vec<PricedLine> = snapshots.iter().map(LineSnapshot::priced).collect();
    order_total(&priced, delivery_fee)
}

/// Stock consumption of freshly snapshotted lines
pub fn consumption_for_snapshots(snapshots: &[LineSnapshot]) -> FulfillmentResult<StockDelta> {
    consumption_for_persisted(snapshots.iter().map(|s| &s.line))
}

// ============================================================================
// Stock check and edit reconciliation
// ============================================================================

/// Apply a delta to current levels, returning the new quantity per product.
///
/// Fails without partial results when a product is unknown or would go
/// negative.
pub fn project_consumption(
    levels: &HashMap<Uuid, StockLevel>,
    delta: &StockDelta,
) -> FulfillmentResult<BTreeMap<Uuid, i32>> {
    let mut projected = BTreeMap::new();
    for (product_id, change) in delta.iter() {
        let level = levels
            .get(&product_id)
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        let remaining = level
            .quantity
            .checked_sub(change)
            .ok_or(FulfillmentError::QuantityOverflow)?;
        if remaining < 0 {
            return Err(FulfillmentError::InsufficientStock {
                product_id,
                product_name: level.name.clone(),
                required: change,
                available: level.quantity,
            });
        }
        projected.insert(product_id, remaining);
    }
    Ok(projected)
}

/// Net stock change when an order's lines are replaced.
///
/// Items kept on the order contribute the difference between their new and
/// old consumption, removed items give back their old consumption and added
/// items consume in full. Old lines are valued through their stored
/// component snapshots, new lines through their fresh ones.
pub fn reconcile_edit(
    old_lines: &[PersistedLine],
    new_lines: &[LineSnapshot],
) -> FulfillmentResult<StockDelta> {
    let old = consumption_for_persisted(old_lines)?;
    let mut delta = consumption_for_snapshots(new_lines)?;
    delta.merge(&old.negate()?)?;
    Ok(delta.normalized())
}

// ============================================================================
// Status transitions
// ============================================================================

/// Side effects a status change requires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPlan {
    pub persist: bool,
    pub record_sale: bool,
    pub restore_stock: bool,
    pub offset_sale: bool,
}

impl TransitionPlan {
    pub fn is_noop(&self) -> bool {
        !self.persist
    }
}

pub fn plan_transition(from: OrderStatus, to: OrderStatus) -> FulfillmentResult<TransitionPlan> {
    if from == to {
        return Ok(TransitionPlan::default());
    }
    if from.is_terminal() {
        return Err(FulfillmentError::InvalidTransition { from, to });
    }

    let plan = match to {
        OrderStatus::Ready => TransitionPlan {
            persist: true,
            record_sale: true,
            ..Default::default()
        },
        OrderStatus::Canceled => TransitionPlan {
            persist: true,
            restore_stock: true,
            offset_sale: true,
            ..Default::default()
        },
        OrderStatus::UnderReview | OrderStatus::InProduction => TransitionPlan {
            persist: true,
            ..Default::default()
        },
    };
    Ok(plan)
}

/// Orders may be created in any status except canceled
pub fn check_initial_status(status: OrderStatus) -> FulfillmentResult<()> {
    if status.is_terminal() {
        return Err(FulfillmentError::InvalidTransition {
            from: OrderStatus::UnderReview,
            to: status,
        });
    }
    Ok(())
}

/// Lines of a canceled order can no longer be changed
pub fn check_editable(status: OrderStatus) -> FulfillmentResult<()> {
    if status.is_terminal() {
        return Err(FulfillmentError::InvalidTransition {
            from: status,
            to: status,
        });
    }
    Ok(())
}
