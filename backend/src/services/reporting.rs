//! Reporting service for the dashboard and data export

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::Month;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Headline figures for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub date: NaiveDate,
    /// Orders for today that are in production or ready
    pub orders_today: i64,
    /// Total of today's ready orders
    pub revenue_today: Decimal,
    /// Products at or below their minimum quantity
    pub low_stock_count: i64,
    /// Revenue entries of the current month, cancellations included
    pub monthly_revenue: Decimal,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get_dashboard_stats(&self, owner_id: Uuid, today: NaiveDate) -> AppResult<DashboardStats> {
        let (orders_today, revenue_today): (i64, Decimal) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status IN ('in_production', 'ready')),
                COALESCE(SUM(total_amount) FILTER (WHERE status = 'ready'), 0)
            FROM orders
            WHERE owner_id = $1 AND delivery_date = $2
            "#,
        )
        .bind(owner_id)
        .bind(today)
        .fetch_one(&self.db)
        .await?;

        let low_stock_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM stock WHERE owner_id = $1 AND quantity <= min_quantity",
        )
        .bind(owner_id)
        .fetch_one(&self.db)
        .await?;

        let month = Month::of(today).range();
        let monthly_revenue: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM financial_transactions
            WHERE owner_id = $1
              AND transaction_type = 'revenue'
              AND date BETWEEN $2 AND $3
            "#,
        )
        .bind(owner_id)
        .bind(month.start)
        .bind(month.end)
        .fetch_one(&self.db)
        .await?;

        Ok(DashboardStats {
            date: today,
            orders_today,
            revenue_today,
            low_stock_count,
            monthly_revenue,
        })
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        date: NaiveDate,
        description: String,
        amount: Decimal,
    }

    #[test]
    fn test_export_to_csv_writes_header_and_rows() {
        let rows = vec![
            Row {
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                description: "Sale of order PED-0001".into(),
                amount: Decimal::new(4500, 2),
            },
            Row {
                date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                description: "Flour, sugar".into(),
                amount: Decimal::new(1250, 2),
            },
        ];

        let csv = ReportingService::export_to_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "date,description,amount");
        assert_eq!(lines[1], "2024-05-01,Sale of order PED-0001,45.00");
        assert_eq!(lines[2], "2024-05-02,\"Flour, sugar\",12.50");
    }

    #[test]
    fn test_export_empty() {
        let rows: Vec<Row> = vec![];
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
