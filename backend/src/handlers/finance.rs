//! Finance HTTP handlers: ledger, receipts, export and monthly summary

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use shared::{FinanceSummary, Month};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::receipt_storage::{content_type_for, ReceiptStorage};
use crate::middleware::CurrentUser;
use crate::services::finance::{
    CreateTransactionInput, FinancialTransaction, TransactionExportRow, TransactionFilter,
};
use crate::services::{FinanceService, ReportingService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<Json<Vec<FinancialTransaction>>> {
    let service = FinanceService::new(state.db.clone());
    let transactions = service
        .list_transactions(current_user.0.user_id, &filter)
        .await?;
    Ok(Json(transactions))
}

/// Record a manual ledger entry
pub async fn create_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTransactionInput>,
) -> AppResult<(StatusCode, Json<FinancialTransaction>)> {
    let service = FinanceService::new(state.db.clone());
    let transaction = service
        .create_transaction(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Delete a transaction and its receipt file
pub async fn delete_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = FinanceService::new(state.db.clone());
    let deleted = service
        .delete_transaction(current_user.0.user_id, transaction_id)
        .await?;

    if let Some(path) = deleted.receipt_path.as_deref() {
        let storage = ReceiptStorage::from_config(&state.config.storage);
        if let Err(e) = storage.delete(path).await {
            tracing::error!(
                transaction_id = %transaction_id,
                path = %path,
                error = %e,
                "Failed to remove receipt of deleted transaction"
            );
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Attach a receipt to an expense (multipart field `file`)
pub async fn upload_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transaction_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<FinancialTransaction>> {
    let owner_id = current_user.0.user_id;
    let service = FinanceService::new(state.db.clone());
    let transaction = service
        .ensure_receipt_allowed(owner_id, transaction_id)
        .await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("receipt").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, bytes));
        break;
    }

    let (file_name, content_type, bytes) = upload.ok_or_else(|| AppError::Validation {
        field: "file".to_string(),
        message: "Receipt file is required".to_string(),
        message_pt: "O arquivo do comprovante é obrigatório".to_string(),
    })?;

    let storage = ReceiptStorage::from_config(&state.config.storage);
    let path = storage
        .store(owner_id, transaction_id, &file_name, &content_type, &bytes)
        .await?;
    let updated = service
        .set_receipt_path(owner_id, transaction_id, &path)
        .await?;

    if let Some(previous) = transaction.receipt_path.as_deref().filter(|p| *p != path) {
        if let Err(e) = storage.delete(previous).await {
            tracing::warn!(path = %previous, error = %e, "Failed to remove replaced receipt");
        }
    }

    Ok(Json(updated))
}

/// Download the receipt attached to a transaction
pub async fn download_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transaction_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = FinanceService::new(state.db.clone());
    let transaction = service
        .get_transaction(current_user.0.user_id, transaction_id)
        .await?;
    let path = transaction
        .receipt_path
        .ok_or_else(|| AppError::NotFound("Receipt".to_string()))?;

    let storage = ReceiptStorage::from_config(&state.config.storage);
    let bytes = storage.read(&path).await?;

    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes))
}

/// Export the filtered ledger as CSV
pub async fn export_transactions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TransactionFilter>,
) -> AppResult<impl IntoResponse> {
    let service = FinanceService::new(state.db.clone());
    let transactions = service
        .list_transactions(current_user.0.user_id, &filter)
        .await?;
    let rows: Vec<TransactionExportRow> = transactions.iter().map(Into::into).collect();
    let csv = ReportingService::export_to_csv(&rows)?;

    let disposition = match (filter.start_date, filter.end_date) {
        (Some(start), Some(end)) => {
            format!("attachment; filename=\"transactions_{}_{}.csv\"", start, end)
        }
        _ => "attachment; filename=\"transactions.csv\"".to_string(),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// Monthly summary, defaulting to the current month
pub async fn get_finance_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<FinanceSummary>> {
    let current = Month::of(Utc::now().date_naive());
    let month = Month::new(
        query.year.unwrap_or(current.year),
        query.month.unwrap_or(current.month),
    )
    .ok_or_else(|| AppError::Validation {
        field: "month".to_string(),
        message: "Month must be between 1 and 12".to_string(),
        message_pt: "O mês deve estar entre 1 e 12".to_string(),
    })?;

    let service = FinanceService::new(state.db.clone());
    let summary = service.get_summary(current_user.0.user_id, month).await?;
    Ok(Json(summary))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation {
        field: "file".to_string(),
        message: format!("Invalid upload: {}", e),
        message_pt: format!("Envio inválido: {}", e),
    }
}
