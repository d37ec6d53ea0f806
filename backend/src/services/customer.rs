//! Customer records

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::CustomerInput;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `%term%` pattern for ILIKE with wildcard characters escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl CustomerService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List customers, optionally matching name, phone or address
    pub async fn list_customers(
        &self,
        owner_id: Uuid,
        search: Option<&str>,
    ) -> AppResult<Vec<Customer>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, owner_id, name, phone, address, notes, created_at, updated_at
            FROM customers
            WHERE owner_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2
                   OR phone ILIKE $2
                   OR COALESCE(address, '') ILIKE $2)
            ORDER BY name ASC
            "#,
        )
        .bind(owner_id)
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(customers)
    }

    pub async fn get_customer(&self, owner_id: Uuid, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, owner_id, name, phone, address, notes, created_at, updated_at
            FROM customers
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(customer_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    pub async fn create_customer(
        &self,
        owner_id: Uuid,
        input: CustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;
        let input = input.normalized();

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (owner_id, name, phone, address, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner_id, name, phone, address, notes, created_at, updated_at
            "#,
        )
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(customer_id = %customer.id, owner_id = %owner_id, "Created customer");
        Ok(customer)
    }

    pub async fn update_customer(
        &self,
        owner_id: Uuid,
        customer_id: Uuid,
        input: CustomerInput,
    ) -> AppResult<Customer> {
        input.validate()?;
        let input = input.normalized();

        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = $3, phone = $4, address = $5, notes = $6, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING id, owner_id, name, phone, address, notes, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(owner_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.notes)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Delete a customer that has no orders
    pub async fn delete_customer(&self, owner_id: Uuid, customer_id: Uuid) -> AppResult<()> {
        let order_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND owner_id = $2",
        )
        .bind(customer_id)
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        if order_count > 0 {
            return Err(AppError::Conflict {
                resource: "customer".to_string(),
                message: "Customer has orders and cannot be deleted".to_string(),
                message_pt: "O cliente possui pedidos e não pode ser excluído".to_string(),
            });
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = $1 AND owner_id = $2")
            .bind(customer_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer".to_string()));
        }

        tracing::info!(customer_id = %customer_id, owner_id = %owner_id, "Deleted customer");
        Ok(())
    }
}
