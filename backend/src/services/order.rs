//! Order management and the fulfillment workflow
//!
//! Placement, editing and status changes each run in one database
//! transaction. Stock rows are locked `FOR UPDATE` in ascending id order and
//! the order header is locked for edits and transitions, so concurrent
//! workflows on the same products serialize instead of overselling.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    check_editable, check_initial_status, consumption_for_persisted, consumption_for_snapshots,
    format_order_code, plan_transition, project_consumption, reconcile_edit, snapshot_lines,
    snapshot_total, Catalog, CatalogCombo, CatalogProduct, ComboComponent, LineItem,
    LineSnapshot, OrderLine, OrderStatus, PersistedLine,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::combo::load_combo_components;
use crate::services::customer::like_pattern;
use crate::services::finance::{apply_ledger_effect, LedgerEffect, OrderLedgerRef};
use crate::services::stock::{lock_stock_levels, write_stock_levels};

/// Number of orders in the "recent orders" listing
pub const RECENT_ORDERS_LIMIT: i64 = 5;

#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

// ============================================================================
// Rows and views
// ============================================================================

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: i64,
    owner_id: Uuid,
    customer_id: Uuid,
    customer_name: String,
    customer_phone: String,
    address: Option<String>,
    notes: Option<String>,
    delivery_date: NaiveDate,
    delivery_time: Option<NaiveTime>,
    delivery_fee: Decimal,
    total_amount: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: i64,
    pub code: String,
    pub owner_id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub delivery_date: NaiveDate,
    pub delivery_time: Option<NaiveTime>,
    pub delivery_fee: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            code: format_order_code(row.order_number),
            owner_id: row.owner_id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            address: row.address,
            notes: row.notes,
            delivery_date: row.delivery_date,
            delivery_time: row.delivery_time,
            delivery_fee: row.delivery_fee,
            total_amount: row.total_amount,
            status: row.status.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Order {
    fn ledger_ref(&self) -> OrderLedgerRef {
        OrderLedgerRef {
            order_id: self.id,
            owner_id: self.owner_id,
            order_number: self.order_number,
            total_amount: self.total_amount,
            delivery_date: self.delivery_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub is_combo: bool,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub components: Json<Vec<ComboComponent>>,
}

impl OrderItem {
    pub fn persisted_line(&self) -> PersistedLine {
        PersistedLine {
            item: LineItem::from_parts(self.item_id, self.is_combo),
            quantity: self.quantity,
            components: self.components.0.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub item_id: Uuid,
    #[serde(default)]
    pub is_combo: bool,
    pub quantity: i32,
}

impl OrderItemInput {
    fn as_line(&self) -> OrderLine {
        OrderLine {
            item: LineItem::from_parts(self.item_id, self.is_combo),
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrderInput {
    pub customer_id: Uuid,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    pub delivery_date: NaiveDate,
    pub delivery_time: Option<NaiveTime>,
    #[validate(custom = "shared::price_rule")]
    #[serde(default)]
    pub delivery_fee: Decimal,
    /// Only honoured on creation
    pub status: Option<OrderStatus>,
    pub items: Vec<OrderItemInput>,
}

impl OrderInput {
    fn lines(&self) -> Vec<OrderLine> {
        self.items.iter().map(OrderItemInput::as_line).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusInput {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.order_number, o.owner_id, o.customer_id,
           c.name AS customer_name, c.phone AS customer_phone,
           o.address, o.notes, o.delivery_date, o.delivery_time,
           o.delivery_fee, o.total_amount, o.status, o.created_at, o.updated_at
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
"#;

// ============================================================================
// Service
// ============================================================================

impl OrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_orders(&self, owner_id: Uuid, filter: &OrderFilter) -> AppResult<Vec<Order>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let limit = filter.limit.unwrap_or(500).clamp(1, 1000);

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            {ORDER_SELECT}
            WHERE o.owner_id = $1
              AND ($2::text IS NULL OR o.status = $2)
              AND ($3::text IS NULL
                   OR c.name ILIKE $3
                   OR c.phone ILIKE $3
                   OR ('PED-' || LPAD(o.order_number::text,
                                        GREATEST(4, LENGTH(o.order_number::text)), '0')) ILIKE $3)
              AND ($4::date IS NULL OR o.delivery_date = $4)
            ORDER BY o.created_at DESC
            LIMIT $5
            "#
        ))
        .bind(owner_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(pattern)
        .bind(filter.delivery_date)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    /// Orders to be delivered on the given day
    pub async fn list_orders_for_day(&self, owner_id: Uuid, day: NaiveDate) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            {ORDER_SELECT}
            WHERE o.owner_id = $1 AND o.delivery_date = $2
            ORDER BY o.delivery_time ASC NULLS LAST, o.order_number ASC
            "#
        ))
        .bind(owner_id)
        .bind(day)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    pub async fn list_recent_orders(&self, owner_id: Uuid) -> AppResult<Vec<Order>> {
        self.list_orders(
            owner_id,
            &OrderFilter {
                limit: Some(RECENT_ORDERS_LIMIT),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn get_order(&self, owner_id: Uuid, order_id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        load_detail(&mut conn, owner_id, order_id).await
    }

    /// Place an order: snapshot lines, check and deduct stock, and record
    /// the sale when the order starts out ready
    pub async fn create_order(&self, owner_id: Uuid, input: OrderInput) -> AppResult<OrderDetail> {
        input.validate()?;
        let status = input.status.unwrap_or_default();
        check_initial_status(status)?;

        let mut tx = self.db.begin().await?;

        ensure_customer(&mut tx, owner_id, input.customer_id).await?;

        let lines = input.lines();
        let catalog = load_catalog(&mut tx, owner_id, &lines).await?;
        let snapshots = snapshot_lines(&lines, &catalog)?;
        let consumption = consumption_for_snapshots(&snapshots)?;

        let levels = lock_stock_levels(&mut tx, owner_id, &consumption.product_ids()).await?;
        let remaining = project_consumption(&levels, &consumption)?;

        let total = snapshot_total(&snapshots, input.delivery_fee);

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders
                (owner_id, customer_id, address, notes, delivery_date, delivery_time,
                 delivery_fee, total_amount, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(input.customer_id)
        .bind(shared::non_blank(input.address.clone()))
        .bind(shared::non_blank(input.notes.clone()))
        .bind(input.delivery_date)
        .bind(input.delivery_time)
        .bind(input.delivery_fee)
        .bind(total)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        insert_items(&mut tx, owner_id, order_id, &snapshots).await?;
        write_stock_levels(&mut tx, owner_id, &remaining).await?;

        let detail = load_detail(&mut tx, owner_id, order_id).await?;
        if status == OrderStatus::Ready {
            apply_ledger_effect(&mut tx, LedgerEffect::Sale, &detail.order.ledger_ref()).await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            owner_id = %owner_id,
            code = %detail.order.code,
            total = %total,
            products = consumption.len(),
            "Order placed"
        );
        Ok(detail)
    }

    /// Replace an order's lines and delivery details, reconciling stock
    /// against what the order had already consumed
    pub async fn update_order(
        &self,
        owner_id: Uuid,
        order_id: Uuid,
        input: OrderInput,
    ) -> AppResult<OrderDetail> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let current = lock_order(&mut tx, owner_id, order_id).await?;
        check_editable(current.status)?;
        ensure_customer(&mut tx, owner_id, input.customer_id).await?;

        let old_lines: Vec<PersistedLine> = load_items(&mut tx, order_id)
            .await?
            .iter()
            .map(OrderItem::persisted_line)
            .collect();

        let lines = input.lines();
        let catalog = load_catalog(&mut tx, owner_id, &lines).await?;
        let snapshots = snapshot_lines(&lines, &catalog)?;
        let delta = reconcile_edit(&old_lines, &snapshots)?;

        let levels = lock_stock_levels(&mut tx, owner_id, &delta.product_ids()).await?;
        let updated_levels = project_consumption(&levels, &delta)?;

        let total = snapshot_total(&snapshots, input.delivery_fee);

        sqlx::query(
            r#"
            UPDATE orders
            SET customer_id = $3, address = $4, notes = $5, delivery_date = $6,
                delivery_time = $7, delivery_fee = $8, total_amount = $9, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(order_id)
        .bind(owner_id)
        .bind(input.customer_id)
        .bind(shared::non_blank(input.address.clone()))
        .bind(shared::non_blank(input.notes.clone()))
        .bind(input.delivery_date)
        .bind(input.delivery_time)
        .bind(input.delivery_fee)
        .bind(total)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, owner_id, order_id, &snapshots).await?;
        write_stock_levels(&mut tx, owner_id, &updated_levels).await?;

        let detail = load_detail(&mut tx, owner_id, order_id).await?;
        if detail.order.status == OrderStatus::Ready {
            apply_ledger_effect(&mut tx, LedgerEffect::SaleUpdate, &detail.order.ledger_ref())
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            owner_id = %owner_id,
            total = %total,
            stock_changes = delta.len(),
            "Order updated"
        );
        Ok(detail)
    }

    /// Move an order to a new status and apply the stock and ledger side
    /// effects the transition calls for
    pub async fn update_status(
        &self,
        owner_id: Uuid,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;

        let current = lock_order(&mut tx, owner_id, order_id).await?;
        let plan = plan_transition(current.status, new_status)?;

        if plan.is_noop() {
            let detail = load_detail(&mut tx, owner_id, order_id).await?;
            tx.commit().await?;
            tracing::debug!(order_id = %order_id, status = %new_status, "Status unchanged");
            return Ok(detail);
        }

        if plan.restore_stock {
            let items = load_items(&mut tx, order_id).await?;
            let lines: Vec<PersistedLine> = items.iter().map(OrderItem::persisted_line).collect();
            let restore = consumption_for_persisted(&lines)?.negate()?;
            let levels = lock_stock_levels(&mut tx, owner_id, &restore.product_ids()).await?;
            let restored = project_consumption(&levels, &restore)?;
            write_stock_levels(&mut tx, owner_id, &restored).await?;
        }

        sqlx::query("UPDATE orders SET status = $3, updated_at = NOW() WHERE id = $1 AND owner_id = $2")
            .bind(order_id)
            .bind(owner_id)
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await?;

        let detail = load_detail(&mut tx, owner_id, order_id).await?;
        let ledger = detail.order.ledger_ref();
        if plan.record_sale {
            apply_ledger_effect(&mut tx, LedgerEffect::Sale, &ledger).await?;
        }
        if plan.offset_sale {
            apply_ledger_effect(&mut tx, LedgerEffect::Cancellation, &ledger).await?;
        }

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            owner_id = %owner_id,
            from = %current.status,
            to = %new_status,
            "Order status changed"
        );
        Ok(detail)
    }

    /// Delete an order together with its items and ledger entries. Stock is
    /// left as it is.
    pub async fn delete_order(&self, owner_id: Uuid, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM financial_transactions WHERE order_id = $1 AND owner_id = $2")
            .bind(order_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1 AND owner_id = $2")
            .bind(order_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order".to_string()));
        }

        tx.commit().await?;

        tracing::info!(order_id = %order_id, owner_id = %owner_id, "Order deleted");
        Ok(())
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

struct LockedOrder {
    status: OrderStatus,
}

async fn lock_order(conn: &mut PgConnection, owner_id: Uuid, order_id: Uuid) -> AppResult<LockedOrder> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM orders WHERE id = $1 AND owner_id = $2 FOR UPDATE",
    )
    .bind(order_id)
    .bind(owner_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    Ok(LockedOrder {
        status: status.parse().map_err(AppError::Internal)?,
    })
}

async fn ensure_customer(conn: &mut PgConnection, owner_id: Uuid, customer_id: Uuid) -> AppResult<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1 AND owner_id = $2)",
    )
    .bind(customer_id)
    .bind(owner_id)
    .fetch_one(&mut *conn)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Customer".to_string()));
    }
    Ok(())
}

/// Current definitions of the products and combos the lines reference
async fn load_catalog(
    conn: &mut PgConnection,
    owner_id: Uuid,
    lines: &[OrderLine],
) -> AppResult<Catalog> {
    let mut product_ids = Vec::new();
    let mut combo_ids = Vec::new();
    for line in lines {
        match line.item {
            LineItem::Product(id) => product_ids.push(id),
            LineItem::Combo(id) => combo_ids.push(id),
        }
    }

    let mut catalog = Catalog::new();

    if !product_ids.is_empty() {
        let products = sqlx::query_as::<_, (Uuid, String, Decimal)>(
            "SELECT id, name, price FROM stock WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner_id)
        .bind(&product_ids)
        .fetch_all(&mut *conn)
        .await?;

        for (id, name, price) in products {
            catalog.insert_product(id, CatalogProduct { name, price });
        }
    }

    if !combo_ids.is_empty() {
        let combos = sqlx::query_as::<_, (Uuid, String, Decimal)>(
            "SELECT id, name, price FROM product_combos WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner_id)
        .bind(&combo_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut components = load_combo_components(&mut *conn, owner_id, &combo_ids).await?;
        for (id, name, price) in combos {
            catalog.insert_combo(
                id,
                CatalogCombo {
                    name,
                    price,
                    components: components.remove(&id).unwrap_or_default(),
                },
            );
        }
    }

    Ok(catalog)
}

async fn insert_items(
    conn: &mut PgConnection,
    owner_id: Uuid,
    order_id: Uuid,
    snapshots: &[LineSnapshot],
) -> AppResult<()> {
    for (position, snapshot) in snapshots.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items
                (order_id, owner_id, item_id, is_combo, name, unit_price, quantity, components, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order_id)
        .bind(owner_id)
        .bind(snapshot.line.item.id())
        .bind(snapshot.line.item.is_combo())
        .bind(&snapshot.name)
        .bind(snapshot.unit_price)
        .bind(snapshot.line.quantity)
        .bind(Json(&snapshot.line.components))
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn load_items(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT id, order_id, item_id, is_combo, name, unit_price, quantity, components
        FROM order_items
        WHERE order_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn load_detail(conn: &mut PgConnection, owner_id: Uuid, order_id: Uuid) -> AppResult<OrderDetail> {
    let order: Order = sqlx::query_as::<_, OrderRow>(&format!(
        "{ORDER_SELECT} WHERE o.id = $1 AND o.owner_id = $2"
    ))
    .bind(order_id)
    .bind(owner_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))?
    .try_into()?;

    let items = load_items(conn, order_id).await?;
    Ok(OrderDetail { order, items })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(item_id: Uuid, is_combo: bool, quantity: i32) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            item_id,
            is_combo,
            name: "Item".into(),
            unit_price: Decimal::ONE,
            quantity,
            components: Json(vec![]),
        }
    }

    #[test]
    fn test_persisted_line_uses_snapshot() {
        let combo = Uuid::new_v4();
        let product = Uuid::new_v4();
        let mut stored = item(combo, true, 2);
        stored.components = Json(vec![ComboComponent::new(product, 3)]);

        let line = stored.persisted_line();
        assert_eq!(line.item, LineItem::Combo(combo));
        assert_eq!(line.components, vec![ComboComponent::new(product, 3)]);
    }

    #[test]
    fn test_order_input_defaults() {
        let json = serde_json::json!({
            "customer_id": Uuid::nil(),
            "delivery_date": "2024-05-10",
            "items": [{ "item_id": Uuid::nil(), "quantity": 2 }]
        });
        let input: OrderInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.delivery_fee, Decimal::ZERO);
        assert_eq!(input.status, None);
        assert_eq!(input.lines()[0].item, LineItem::Product(Uuid::nil()));
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_order_input_rejects_negative_fee() {
        let json = serde_json::json!({
            "customer_id": Uuid::nil(),
            "delivery_date": "2024-05-10",
            "delivery_fee": "-1.00",
            "items": []
        });
        let input: OrderInput = serde_json::from_value(json).unwrap();
        assert!(input.validate().is_err());
    }
}
