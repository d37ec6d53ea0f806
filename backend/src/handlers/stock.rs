//! Stock HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::customer::SearchQuery;
use crate::middleware::CurrentUser;
use crate::services::stock::{ProductInput, QuantityInput, StockItem};
use crate::services::StockService;
use crate::AppState;

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<StockItem>>> {
    let service = StockService::new(state.db.clone());
    let products = service
        .list_products(current_user.0.user_id, query.search.as_deref())
        .await?;
    Ok(Json(products))
}

/// Products that need restocking
pub async fn list_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<StockItem>>> {
    let service = StockService::new(state.db.clone());
    let products = service.list_low_stock(current_user.0.user_id).await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db.clone());
    let product = service.get_product(current_user.0.user_id, product_id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ProductInput>,
) -> AppResult<(StatusCode, Json<StockItem>)> {
    let service = StockService::new(state.db.clone());
    let product = service.create_product(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db.clone());
    let product = service
        .update_product(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(product))
}

pub async fn set_product_quantity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<QuantityInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db.clone());
    let product = service
        .set_quantity(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = StockService::new(state.db.clone());
    service.delete_product(current_user.0.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
