//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::order::{Order, OrderDetail, OrderFilter, OrderInput, StatusInput};
use crate::services::OrderService;
use crate::AppState;

/// List orders, newest first
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    let service = OrderService::new(state.db.clone());
    let orders = service.list_orders(current_user.0.user_id, &filter).await?;
    Ok(Json(orders))
}

/// Orders delivering today, by delivery time
pub async fn list_todays_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let service = OrderService::new(state.db.clone());
    let today = Utc::now().date_naive();
    let orders = service
        .list_orders_for_day(current_user.0.user_id, today)
        .await?;
    Ok(Json(orders))
}

pub async fn list_recent_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Order>>> {
    let service = OrderService::new(state.db.clone());
    let orders = service.list_recent_orders(current_user.0.user_id).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db.clone());
    let order = service.get_order(current_user.0.user_id, order_id).await?;
    Ok(Json(order))
}

/// Place an order, consuming stock for every line
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<OrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let service = OrderService::new(state.db.clone());
    let order = service.create_order(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Replace an order's header and lines, reconciling stock by difference
pub async fn update_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<OrderInput>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db.clone());
    let order = service
        .update_order(current_user.0.user_id, order_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<StatusInput>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db.clone());
    let order = service
        .update_status(current_user.0.user_id, order_id, input.status)
        .await?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = OrderService::new(state.db.clone());
    service.delete_order(current_user.0.user_id, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
