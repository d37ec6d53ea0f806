//! Product combos (bundles)

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{combo_availability, ComboComponent};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ComboService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Combo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A combo component with the product's current name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComboItem {
    pub combo_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComboWithItems {
    #[serde(flatten)]
    pub combo: Combo,
    pub items: Vec<ComboItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComboAvailability {
    pub combo_id: Uuid,
    pub available: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComboItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ComboInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(custom = "shared::price_rule")]
    pub price: Decimal,
    pub items: Vec<ComboItemInput>,
}

impl ComboInput {
    /// Components in input order; at least one, positive quantities, no repeats
    pub fn components(&self) -> AppResult<Vec<ComboComponent>> {
        if self.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "A combo needs at least one product".to_string(),
                message_pt: "O combo precisa de pelo menos um produto".to_string(),
            });
        }

        let mut seen = HashSet::new();
        self.items
            .iter()
            .map(|item| {
                if item.quantity <= 0 {
                    return Err(AppError::Validation {
                        field: "items.quantity".to_string(),
                        message: "Quantity must be greater than zero".to_string(),
                        message_pt: "A quantidade deve ser maior que zero".to_string(),
                    });
                }
                if !seen.insert(item.product_id) {
                    return Err(AppError::Validation {
                        field: "items.product_id".to_string(),
                        message: "Each product may appear only once in a combo".to_string(),
                        message_pt: "Cada produto só pode aparecer uma vez no combo".to_string(),
                    });
                }
                Ok(ComboComponent::new(item.product_id, item.quantity))
            })
            .collect()
    }
}

impl ComboService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_combos(&self, owner_id: Uuid) -> AppResult<Vec<ComboWithItems>> {
        let combos = sqlx::query_as::<_, Combo>(
            r#"
            SELECT id, owner_id, name, description, price, created_at, updated_at
            FROM product_combos
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = combos.iter().map(|c| c.id).collect();
        let mut items_by_combo: HashMap<Uuid, Vec<ComboItem>> = HashMap::new();
        for item in self.fetch_items(&ids).await? {
            items_by_combo.entry(item.combo_id).or_default().push(item);
        }

        Ok(combos
            .into_iter()
            .map(|combo| {
                let items = items_by_combo.remove(&combo.id).unwrap_or_default();
                ComboWithItems { combo, items }
            })
            .collect())
    }

    pub async fn get_combo(&self, owner_id: Uuid, combo_id: Uuid) -> AppResult<ComboWithItems> {
        let combo = sqlx::query_as::<_, Combo>(
            r#"
            SELECT id, owner_id, name, description, price, created_at, updated_at
            FROM product_combos
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(combo_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Combo".to_string()))?;

        let items = self.fetch_items(&[combo_id]).await?;
        Ok(ComboWithItems { combo, items })
    }

    pub async fn create_combo(&self, owner_id: Uuid, input: ComboInput) -> AppResult<ComboWithItems> {
        input.validate()?;
        let components = input.components()?;

        let mut tx = self.db.begin().await?;
        ensure_products_exist(&mut tx, owner_id, &components).await?;

        let combo_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO product_combos (owner_id, name, description, price)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(shared::non_blank(input.description.clone()))
        .bind(input.price)
        .fetch_one(&mut *tx)
        .await?;

        insert_components(&mut tx, owner_id, combo_id, &components).await?;
        tx.commit().await?;

        tracing::info!(combo_id = %combo_id, owner_id = %owner_id, "Created combo");
        self.get_combo(owner_id, combo_id).await
    }

    /// Replace a combo's header and composition. Orders already placed keep
    /// the composition they were placed with.
    pub async fn update_combo(
        &self,
        owner_id: Uuid,
        combo_id: Uuid,
        input: ComboInput,
    ) -> AppResult<ComboWithItems> {
        input.validate()?;
        let components = input.components()?;

        let mut tx = self.db.begin().await?;
        ensure_products_exist(&mut tx, owner_id, &components).await?;

        let result = sqlx::query(
            r#"
            UPDATE product_combos
            SET name = $3, description = $4, price = $5, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(combo_id)
        .bind(owner_id)
        .bind(input.name.trim())
        .bind(shared::non_blank(input.description.clone()))
        .bind(input.price)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Combo".to_string()));
        }

        sqlx::query("DELETE FROM combo_items WHERE combo_id = $1")
            .bind(combo_id)
            .execute(&mut *tx)
            .await?;
        insert_components(&mut tx, owner_id, combo_id, &components).await?;
        tx.commit().await?;

        tracing::info!(combo_id = %combo_id, owner_id = %owner_id, "Updated combo");
        self.get_combo(owner_id, combo_id).await
    }

    /// Delete a combo that no order item references
    pub async fn delete_combo(&self, owner_id: Uuid, combo_id: Uuid) -> AppResult<()> {
        let order_refs = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM order_items WHERE item_id = $1 AND is_combo = TRUE AND owner_id = $2",
        )
        .bind(combo_id)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        if order_refs > 0 {
            return Err(AppError::Conflict {
                resource: "combo".to_string(),
                message: "Combo is referenced by orders and cannot be deleted".to_string(),
                message_pt: "O combo está em pedidos e não pode ser excluído".to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM product_combos WHERE id = $1 AND owner_id = $2")
            .bind(combo_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Combo".to_string()));
        }

        tracing::info!(combo_id = %combo_id, owner_id = %owner_id, "Deleted combo");
        Ok(())
    }

    /// How many units of the combo current stock can assemble
    pub async fn get_availability(
        &self,
        owner_id: Uuid,
        combo_id: Uuid,
    ) -> AppResult<ComboAvailability> {
        let combo = self.get_combo(owner_id, combo_id).await?;
        let components: Vec<ComboComponent> = combo
            .items
            .iter()
            .map(|item| ComboComponent::new(item.product_id, item.quantity))
            .collect();
        let product_ids: Vec<Uuid> = components.iter().map(|c| c.product_id).collect();

        let on_hand: HashMap<Uuid, i32> = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT id, quantity FROM stock WHERE owner_id = $1 AND id = ANY($2)",
        )
        .bind(owner_id)
        .bind(&product_ids)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .collect();

        Ok(ComboAvailability {
            combo_id,
            available: combo_availability(&components, &on_hand),
        })
    }

    async fn fetch_items(&self, combo_ids: &[Uuid]) -> AppResult<Vec<ComboItem>> {
        let items = sqlx::query_as::<_, ComboItem>(
            r#"
            SELECT ci.combo_id, ci.product_id, s.name AS product_name, ci.quantity
            FROM combo_items ci
            JOIN stock s ON s.id = ci.product_id
            WHERE ci.combo_id = ANY($1)
            ORDER BY ci.combo_id, ci.position
            "#,
        )
        .bind(combo_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(items)
    }
}

async fn ensure_products_exist(
    conn: &mut PgConnection,
    owner_id: Uuid,
    components: &[ComboComponent],
) -> AppResult<()> {
    let ids: Vec<Uuid> = components.iter().map(|c| c.product_id).collect();
    let found: HashSet<Uuid> =
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM stock WHERE owner_id = $1 AND id = ANY($2)")
            .bind(owner_id)
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .collect();

    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::NotFound(format!("Product {}", missing))),
        None => Ok(()),
    }
}

async fn insert_components(
    conn: &mut PgConnection,
    owner_id: Uuid,
    combo_id: Uuid,
    components: &[ComboComponent],
) -> AppResult<()> {
    for (position, component) in components.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO combo_items (combo_id, product_id, owner_id, quantity, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(combo_id)
        .bind(component.product_id)
        .bind(owner_id)
        .bind(component.quantity)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Current composition of the given combos, keyed by combo id
pub async fn load_combo_components(
    conn: &mut PgConnection,
    owner_id: Uuid,
    combo_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<ComboComponent>>> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, i32)>(
        r#"
        SELECT combo_id, product_id, quantity
        FROM combo_items
        WHERE owner_id = $1 AND combo_id = ANY($2)
        ORDER BY combo_id, position
        "#,
    )
    .bind(owner_id)
    .bind(combo_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut components: HashMap<Uuid, Vec<ComboComponent>> = HashMap::new();
    for (combo_id, product_id, quantity) in rows {
        components
            .entry(combo_id)
            .or_default()
            .push(ComboComponent::new(product_id, quantity));
    }
    Ok(components)
}
