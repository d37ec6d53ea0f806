//! Stock (product) management and the row-level helpers the order workflow
//! uses to lock and write on-hand quantities

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{StockLevel, StockStatus};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::customer::like_pattern;

#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub min_quantity: i32,
    pub category: Option<String>,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.min_quantity)
    }
}

/// Product with its derived stock status
#[derive(Debug, Clone, Serialize)]
pub struct StockItem {
    #[serde(flatten)]
    pub product: Product,
    pub status: StockStatus,
}

impl From<Product> for StockItem {
    fn from(product: Product) -> Self {
        let status = product.status();
        Self { product, status }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(custom = "shared::price_rule")]
    pub price: Decimal,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    #[validate(range(min = 0, message = "Minimum quantity cannot be negative"))]
    pub min_quantity: i32,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuantityInput {
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

const DEFAULT_UNIT: &str = "un";

const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, price, quantity, min_quantity, category, unit, created_at, updated_at";

impl StockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_products(
        &self,
        owner_id: Uuid,
        search: Option<&str>,
    ) -> AppResult<Vec<StockItem>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM stock
            WHERE owner_id = $1
              AND ($2::text IS NULL OR name ILIKE $2 OR COALESCE(category, '') ILIKE $2)
            ORDER BY name ASC
            "#
        ))
        .bind(owner_id)
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(products.into_iter().map(StockItem::from).collect())
    }

    /// Products at or below their minimum, most depleted first
    pub async fn list_low_stock(&self, owner_id: Uuid) -> AppResult<Vec<StockItem>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM stock
            WHERE owner_id = $1 AND quantity <= min_quantity
            ORDER BY quantity ASC, name ASC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        Ok(products.into_iter().map(StockItem::from).collect())
    }

    pub async fn get_product(&self, owner_id: Uuid, product_id: Uuid) -> AppResult<StockItem> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM stock WHERE id = $1 AND owner_id = $2"
        ))
        .bind(product_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .map(StockItem::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    pub async fn create_product(&self, owner_id: Uuid, input: ProductInput) -> AppResult<StockItem> {
        input.validate()?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO stock (owner_id, name, price, quantity, min_quantity, category, unit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(input.price)
        .bind(input.quantity)
        .bind(input.min_quantity)
        .bind(shared::non_blank(input.category))
        .bind(unit_or_default(input.unit))
        .fetch_one(&self.db)
        .await?;

        tracing::info!(product_id = %product.id, owner_id = %owner_id, "Created product");
        Ok(product.into())
    }

    pub async fn update_product(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
        input: ProductInput,
    ) -> AppResult<StockItem> {
        input.validate()?;

        sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE stock
            SET name = $3, price = $4, quantity = $5, min_quantity = $6,
                category = $7, unit = $8, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(input.price)
        .bind(input.quantity)
        .bind(input.min_quantity)
        .bind(shared::non_blank(input.category))
        .bind(unit_or_default(input.unit))
        .fetch_optional(&self.db)
        .await?
        .map(StockItem::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Set the on-hand quantity directly (stock count correction)
    pub async fn set_quantity(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
        input: QuantityInput,
    ) -> AppResult<StockItem> {
        input.validate()?;

        let item = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE stock SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(owner_id)
        .bind(input.quantity)
        .fetch_optional(&self.db)
        .await?
        .map(StockItem::from)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        tracing::info!(
            product_id = %product_id,
            quantity = input.quantity,
            status = %item.status,
            "Stock quantity set"
        );
        Ok(item)
    }

    /// Delete a product that no order item or combo references.
    ///
    /// Combo order lines count through their frozen composition, so a product
    /// dropped from a combo stays undeletable while past orders still consume it.
    /// The stock row is locked before the reference check, the same lock
    /// order placement takes.
    pub async fn delete_product(&self, owner_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stock WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(product_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let (order_refs, combo_refs) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM order_items
                 WHERE owner_id = $2
                   AND ((is_combo = FALSE AND item_id = $1)
                        OR (is_combo = TRUE AND components @> jsonb_build_array(
                                jsonb_build_object('product_id', $1::text))))),
                (SELECT COUNT(*) FROM combo_items WHERE product_id = $1 AND owner_id = $2)
            "#,
        )
        .bind(product_id)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        if order_refs > 0 {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: "Product is referenced by orders and cannot be deleted".to_string(),
                message_pt: "O produto está em pedidos e não pode ser excluído".to_string(),
            });
        }
        if combo_refs > 0 {
            return Err(AppError::Conflict {
                resource: "product".to_string(),
                message: "Product is part of a combo and cannot be deleted".to_string(),
                message_pt: "O produto faz parte de um combo e não pode ser excluído".to_string(),
            });
        }

        sqlx::query("DELETE FROM stock WHERE id = $1 AND owner_id = $2")
            .bind(product_id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(product_id = %product_id, owner_id = %owner_id, "Deleted product");
        Ok(())
    }
}

fn unit_or_default(unit: Option<String>) -> String {
    shared::non_blank(unit).unwrap_or_else(|| DEFAULT_UNIT.to_string())
}

#[derive(Debug, FromRow)]
struct LevelRow {
    id: Uuid,
    name: String,
    quantity: i32,
}

/// Lock the given stock rows for the rest of the transaction and read their
/// quantities. Rows are locked in ascending id order.
pub async fn lock_stock_levels(
    conn: &mut PgConnection,
    owner_id: Uuid,
    product_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, StockLevel>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, LevelRow>(
        r#"
        SELECT id, name, quantity
        FROM stock
        WHERE owner_id = $1 AND id = ANY($2)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(owner_id)
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                StockLevel {
                    product_id: row.id,
                    name: row.name,
                    quantity: row.quantity,
                },
            )
        })
        .collect())
}

/// Write new on-hand quantities for rows already locked by [`lock_stock_levels`]
pub async fn write_stock_levels(
    conn: &mut PgConnection,
    owner_id: Uuid,
    quantities: &BTreeMap<Uuid, i32>,
) -> AppResult<()> {
    for (product_id, quantity) in quantities {
        sqlx::query(
            "UPDATE stock SET quantity = $3, updated_at = NOW() WHERE id = $1 AND owner_id = $2",
        )
        .bind(product_id)
        .bind(owner_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(quantity: i32, min_quantity: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Brigadeiro".to_string(),
            price: Decimal::new(250, 2),
            quantity,
            min_quantity,
            category: None,
            unit: DEFAULT_UNIT.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_combo_snapshot_matches_reference_check_shape() {
        // delete_product matches order_items.components against
        // jsonb_build_array(jsonb_build_object('product_id', <id as text>))
        let product_id = Uuid::new_v4();
        let snapshot = serde_json::to_value(vec![
            shared::ComboComponent::new(Uuid::new_v4(), 1),
            shared::ComboComponent::new(product_id, 2),
        ])
        .unwrap();

        let contains = snapshot.as_array().unwrap().iter().any(|component| {
            component["product_id"] == serde_json::Value::String(product_id.to_string())
        });
        assert!(contains);
    }

    #[test]
    fn test_stock_item_carries_status() {
        let item = StockItem::from(product(2, 5));
        assert_eq!(item.status, StockStatus::Low);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "low");
        assert_eq!(json["name"], "Brigadeiro");
    }

    #[test]
    fn test_product_input_rejects_negative_quantity() {
        let input = ProductInput {
            name: "Pão de mel".into(),
            price: Decimal::new(500, 2),
            quantity: -1,
            min_quantity: 0,
            category: None,
            unit: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_unit_defaults() {
        assert_eq!(unit_or_default(None), "un");
        assert_eq!(unit_or_default(Some(" ".into())), "un");
        assert_eq!(unit_or_default(Some("kg".into())), "kg");
    }
}
