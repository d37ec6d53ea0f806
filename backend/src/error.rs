//! Error handling for the Food Back-Office Platform
//!
//! Provides consistent error responses in English and Portuguese

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::FulfillmentError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_pt: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_pt: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_pt: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock for {product_name}: required {required}, available {available}")]
    InsufficientStock {
        product_name: String,
        required: i32,
        available: i32,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<FulfillmentError> for AppError {
    fn from(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::ComboNotFound(id) => AppError::NotFound(format!("Combo {}", id)),
            FulfillmentError::ProductNotFound(id) => {
                AppError::NotFound(format!("Product {}", id))
            }
            FulfillmentError::InsufficientStock {
                product_name,
                required,
                available,
                ..
            } => AppError::InsufficientStock {
                product_name,
                required,
                available,
            },
            FulfillmentError::InvalidQuantity { .. } | FulfillmentError::QuantityOverflow => {
                AppError::Validation {
                    field: "quantity".to_string(),
                    message: err.to_string(),
                    message_pt: "Quantidade inválida".to_string(),
                }
            }
            FulfillmentError::EmptyOrder => AppError::Validation {
                field: "items".to_string(),
                message: err.to_string(),
                message_pt: "O pedido precisa de pelo menos um item".to_string(),
            },
            FulfillmentError::InvalidTransition { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let first = errors.field_errors().into_iter().find_map(|(field, list)| {
            list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                (field.to_string(), message)
            })
        });

        match first {
            Some((field, message)) => AppError::Validation {
                message_pt: format!("Valor inválido para {}", field),
                field,
                message,
            },
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_pt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::TokenExpired
            | AppError::InvalidToken
            | AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. } | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) | AppError::InsufficientStock { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> ErrorDetail {
        match self {
            AppError::InvalidCredentials => ErrorDetail {
                code: "INVALID_CREDENTIALS".to_string(),
                message_en: "Invalid email or password".to_string(),
                message_pt: "E-mail ou senha inválidos".to_string(),
                field: None,
            },
            AppError::TokenExpired => ErrorDetail {
                code: "TOKEN_EXPIRED".to_string(),
                message_en: "Token has expired".to_string(),
                message_pt: "O token expirou".to_string(),
                field: None,
            },
            AppError::InvalidToken => ErrorDetail {
                code: "INVALID_TOKEN".to_string(),
                message_en: "Invalid token".to_string(),
                message_pt: "Token inválido".to_string(),
                field: None,
            },
            AppError::Unauthorized {
                message,
                message_pt,
            } => ErrorDetail {
                code: "UNAUTHORIZED".to_string(),
                message_en: message.clone(),
                message_pt: message_pt.clone(),
                field: None,
            },
            AppError::Validation {
                field,
                message,
                message_pt,
            } => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: message.clone(),
                message_pt: message_pt.clone(),
                field: Some(field.clone()),
            },
            AppError::ValidationError(msg) => ErrorDetail {
                code: "VALIDATION_ERROR".to_string(),
                message_en: msg.clone(),
                message_pt: format!("Dados inválidos: {}", msg),
                field: None,
            },
            AppError::DuplicateEntry(field) => ErrorDetail {
                code: "CONFLICT".to_string(),
                message_en: format!("A record with this {} already exists", field),
                message_pt: format!("Já existe um registro com este {}", field),
                field: Some(field.clone()),
            },
            AppError::Conflict {
                resource,
                message,
                message_pt,
            } => ErrorDetail {
                code: "CONFLICT".to_string(),
                message_en: message.clone(),
                message_pt: message_pt.clone(),
                field: Some(resource.clone()),
            },
            AppError::NotFound(resource) => ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: format!("{} not found", resource),
                message_pt: format!("{} não encontrado", resource),
                field: None,
            },
            AppError::InvalidStateTransition(msg) => ErrorDetail {
                code: "INVALID_STATE_TRANSITION".to_string(),
                message_en: msg.clone(),
                message_pt: format!("Não é possível alterar o status: {}", msg),
                field: None,
            },
            AppError::InsufficientStock {
                product_name,
                required,
                available,
            } => ErrorDetail {
                code: "INSUFFICIENT_STOCK".to_string(),
                message_en: format!(
                    "Insufficient stock for {}: required {}, available {}",
                    product_name, required, available
                ),
                message_pt: format!(
                    "Estoque insuficiente para {}: necessário {}, disponível {}",
                    product_name, required, available
                ),
                field: None,
            },
            AppError::StorageError(msg) => ErrorDetail {
                code: "STORAGE_ERROR".to_string(),
                message_en: format!("Storage error: {}", msg),
                message_pt: format!("Erro de armazenamento: {}", msg),
                field: None,
            },
            AppError::DatabaseError(_) => ErrorDetail {
                code: "DATABASE_ERROR".to_string(),
                message_en: "A database error occurred".to_string(),
                message_pt: "Ocorreu um erro no banco de dados".to_string(),
                field: None,
            },
            AppError::Internal(_) | AppError::InternalError(_) => ErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message_en: "An internal server error occurred".to_string(),
                message_pt: "Ocorreu um erro interno no servidor".to_string(),
                field: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn fulfillment_errors_map_to_http_kinds() {
        let missing: AppError = FulfillmentError::ComboNotFound(Uuid::nil()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let short: AppError = FulfillmentError::InsufficientStock {
            product_id: Uuid::nil(),
            product_name: "B".into(),
            required: 1,
            available: 0,
        }
        .into();
        assert_eq!(short.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(short.detail().message_en.contains("required 1, available 0"));

        let overflow: AppError = FulfillmentError::QuantityOverflow.into();
        assert_eq!(overflow.status_code(), StatusCode::BAD_REQUEST);

        let transition: AppError = FulfillmentError::InvalidTransition {
            from: shared::OrderStatus::Canceled,
            to: shared::OrderStatus::Ready,
        }
        .into();
        assert_eq!(transition.detail().code, "INVALID_STATE_TRANSITION");
    }

    #[test]
    fn database_details_are_not_leaked() {
        let err = AppError::Internal("connection string secret".into());
        assert!(!err.detail().message_en.contains("secret"));
    }

    #[test]
    fn duplicate_entry_is_a_conflict() {
        let err = AppError::DuplicateEntry("email".into());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.detail().field.as_deref(), Some("email"));
    }
}
