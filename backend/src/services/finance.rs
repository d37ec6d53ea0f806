//! Financial transactions: manual entries, receipts, summaries and the
//! ledger writes triggered by order status changes

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    format_order_code, order_cancellation_key, order_sale_key, DateRange, FinanceSummary,
    LedgerEntry, Month, TransactionCategory, TransactionType,
};
use sqlx::{Connection, FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::customer::like_pattern;

#[derive(Clone)]
pub struct FinanceService {
    db: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    id: Uuid,
    owner_id: Uuid,
    date: NaiveDate,
    description: String,
    category: String,
    amount: Decimal,
    transaction_type: String,
    order_id: Option<Uuid>,
    receipt_path: Option<String>,
    idempotency_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialTransaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub category: TransactionCategory,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub order_id: Option<Uuid>,
    pub receipt_path: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for FinancialTransaction {
    type Error = AppError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            date: row.date,
            description: row.description,
            category: row.category.parse().map_err(AppError::Internal)?,
            amount: row.amount,
            transaction_type: row.transaction_type.parse().map_err(AppError::Internal)?,
            order_id: row.order_id,
            receipt_path: row.receipt_path,
            idempotency_key: row.idempotency_key,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Flat row for CSV export
#[derive(Debug, Clone, Serialize)]
pub struct TransactionExportRow {
    pub date: NaiveDate,
    pub description: String,
    pub category: &'static str,
    pub transaction_type: &'static str,
    pub amount: Decimal,
    pub order_id: Option<Uuid>,
}

impl From<&FinancialTransaction> for TransactionExportRow {
    fn from(t: &FinancialTransaction) -> Self {
        Self {
            date: t.date,
            description: t.description.clone(),
            category: t.category.as_str(),
            transaction_type: t.transaction_type.as_str(),
            amount: t.amount,
            order_id: t.order_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionInput {
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500, message = "Description is required"))]
    pub description: String,
    pub category: TransactionCategory,
    pub transaction_type: TransactionType,
    #[validate(custom = "shared::transaction_amount_rule")]
    pub amount: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub transaction_type: Option<TransactionType>,
    pub category: Option<TransactionCategory>,
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

const TRANSACTION_COLUMNS: &str = "id, owner_id, date, description, category, amount, \
     transaction_type, order_id, receipt_path, idempotency_key, created_at, updated_at";

impl FinanceService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_transactions(
        &self,
        owner_id: Uuid,
        filter: &TransactionFilter,
    ) -> AppResult<Vec<FinancialTransaction>> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM financial_transactions
            WHERE owner_id = $1
              AND ($2::text IS NULL OR transaction_type = $2)
              AND ($3::text IS NULL OR category = $3)
              AND ($4::text IS NULL OR description ILIKE $4)
              AND ($5::date IS NULL OR date >= $5)
              AND ($6::date IS NULL OR date <= $6)
            ORDER BY date DESC, created_at DESC
            "#
        ))
        .bind(owner_id)
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(pattern)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(FinancialTransaction::try_from).collect()
    }

    pub async fn get_transaction(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
    ) -> AppResult<FinancialTransaction> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM financial_transactions WHERE id = $1 AND owner_id = $2"
        ))
        .bind(transaction_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?
        .try_into()
    }

    /// Record a manual revenue or expense entry
    pub async fn create_transaction(
        &self,
        owner_id: Uuid,
        input: CreateTransactionInput,
    ) -> AppResult<FinancialTransaction> {
        input.validate()?;
        let date = input.date.unwrap_or_else(|| Utc::now().date_naive());

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO financial_transactions
                (owner_id, date, description, category, amount, transaction_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(date)
        .bind(input.description.trim())
        .bind(input.category.as_str())
        .bind(input.amount)
        .bind(input.transaction_type.as_str())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(transaction_id = %row.id, owner_id = %owner_id, "Recorded transaction");
        row.try_into()
    }

    /// Delete a transaction, returning it so its receipt can be removed
    pub async fn delete_transaction(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
    ) -> AppResult<FinancialTransaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            DELETE FROM financial_transactions
            WHERE id = $1 AND owner_id = $2
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .bind(owner_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?;

        tracing::info!(transaction_id = %transaction_id, owner_id = %owner_id, "Deleted transaction");
        row.try_into()
    }

    /// Check that a receipt may be attached to the transaction
    pub async fn ensure_receipt_allowed(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
    ) -> AppResult<FinancialTransaction> {
        let transaction = self.get_transaction(owner_id, transaction_id).await?;
        if transaction.transaction_type != TransactionType::Expense {
            return Err(AppError::Validation {
                field: "transaction_type".to_string(),
                message: "Receipts can only be attached to expenses".to_string(),
                message_pt: "Comprovantes só podem ser anexados a despesas".to_string(),
            });
        }
        Ok(transaction)
    }

    pub async fn set_receipt_path(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
        receipt_path: &str,
    ) -> AppResult<FinancialTransaction> {
        sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE financial_transactions
            SET receipt_path = $3, updated_at = NOW()
            WHERE id = $1 AND owner_id = $2
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction_id)
        .bind(owner_id)
        .bind(receipt_path)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction".to_string()))?
        .try_into()
    }

    /// Revenue, expenses, profit and average ticket for a month
    pub async fn get_summary(&self, owner_id: Uuid, month: Month) -> AppResult<FinanceSummary> {
        let entries = self.ledger_entries(owner_id, month.range()).await?;
        Ok(FinanceSummary::from_entries(&entries))
    }

    async fn ledger_entries(&self, owner_id: Uuid, range: DateRange) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, (NaiveDate, Decimal, String, String)>(
            r#"
            SELECT date, amount, transaction_type, category
            FROM financial_transactions
            WHERE owner_id = $1 AND date BETWEEN $2 AND $3
            "#,
        )
        .bind(owner_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|(date, amount, transaction_type, category)| {
                Ok(LedgerEntry {
                    date,
                    amount,
                    transaction_type: transaction_type.parse().map_err(AppError::Internal)?,
                    category: category.parse().map_err(AppError::Internal)?,
                })
            })
            .collect()
    }
}

// ============================================================================
// Order ledger writes
// ============================================================================

/// Order fields the ledger entries are derived from
#[derive(Debug, Clone, Copy)]
pub struct OrderLedgerRef {
    pub order_id: Uuid,
    pub owner_id: Uuid,
    pub order_number: i64,
    pub total_amount: Decimal,
    pub delivery_date: NaiveDate,
}

/// Insert the sale for a ready order unless it was already recorded.
/// Returns whether a row was inserted.
pub async fn record_order_sale(conn: &mut PgConnection, order: &OrderLedgerRef) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO financial_transactions
            (owner_id, date, description, category, amount, transaction_type, order_id, idempotency_key)
        VALUES ($1, $2, $3, 'sale', $4, 'revenue', $5, $6)
        ON CONFLICT (idempotency_key) DO NOTHING
        "#,
    )
    .bind(order.owner_id)
    .bind(order.delivery_date)
    .bind(format!("Sale of order {}", format_order_code(order.order_number)))
    .bind(order.total_amount)
    .bind(order.order_id)
    .bind(order_sale_key(order.order_id))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Offset the recorded sale of a canceled order.
///
/// The offset is the negated amount of the stored sale entry, not the
/// order's current total, so the two always net to zero. An order canceled
/// before it ever reached `ready` has no sale and gets no offset; nothing is
/// written either when the offset already exists.
pub async fn record_order_cancellation(
    conn: &mut PgConnection,
    order: &OrderLedgerRef,
    canceled_on: NaiveDate,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO financial_transactions
            (owner_id, date, description, category, amount, transaction_type, order_id, idempotency_key)
        SELECT owner_id, $2, $3, 'sale', -amount, 'revenue', order_id, $4
        FROM financial_transactions
        WHERE idempotency_key = $1
        ON CONFLICT (idempotency_key) DO NOTHING
        "#,
    )
    .bind(order_sale_key(order.order_id))
    .bind(canceled_on)
    .bind(format!(
        "Cancellation of order {}",
        format_order_code(order.order_number)
    ))
    .bind(order_cancellation_key(order.order_id))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Bring the sale of a ready order in line with its edited total and date
pub async fn update_order_sale(conn: &mut PgConnection, order: &OrderLedgerRef) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE financial_transactions
        SET amount = $2, date = $3, updated_at = NOW()
        WHERE idempotency_key = $1
        "#,
    )
    .bind(order_sale_key(order.order_id))
    .bind(order.total_amount)
    .bind(order.delivery_date)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    Sale,
    Cancellation,
    SaleUpdate,
}

impl LedgerEffect {
    fn as_str(&self) -> &'static str {
        match self {
            LedgerEffect::Sale => "sale",
            LedgerEffect::Cancellation => "cancellation",
            LedgerEffect::SaleUpdate => "sale_update",
        }
    }
}

/// Apply a ledger write inside a savepoint of the caller's transaction.
///
/// A failed write is logged and rolled back to the savepoint; the caller's
/// primary change still commits.
pub async fn apply_ledger_effect(
    conn: &mut PgConnection,
    effect: LedgerEffect,
    order: &OrderLedgerRef,
) -> AppResult<()> {
    let mut savepoint = conn.begin().await?;

    let outcome = match effect {
        LedgerEffect::Sale => record_order_sale(&mut savepoint, order).await,
        LedgerEffect::Cancellation => {
            record_order_cancellation(&mut savepoint, order, Utc::now().date_naive()).await
        }
        LedgerEffect::SaleUpdate => update_order_sale(&mut savepoint, order).await,
    };

    match outcome {
        Ok(written) => {
            savepoint.commit().await?;
            tracing::debug!(
                order_id = %order.order_id,
                effect = effect.as_str(),
                written,
                "Ledger effect applied"
            );
        }
        Err(e) => {
            tracing::error!(
                order_id = %order.order_id,
                owner_id = %order.owner_id,
                effect = effect.as_str(),
                error = %e,
                "Ledger effect failed; order change kept"
            );
            savepoint.rollback().await?;
        }
    }
    Ok(())
}
