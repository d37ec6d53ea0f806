//! Combo HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::combo::{ComboAvailability, ComboInput, ComboWithItems};
use crate::services::ComboService;
use crate::AppState;

pub async fn list_combos(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ComboWithItems>>> {
    let service = ComboService::new(state.db.clone());
    let combos = service.list_combos(current_user.0.user_id).await?;
    Ok(Json(combos))
}

pub async fn get_combo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(combo_id): Path<Uuid>,
) -> AppResult<Json<ComboWithItems>> {
    let service = ComboService::new(state.db.clone());
    let combo = service.get_combo(current_user.0.user_id, combo_id).await?;
    Ok(Json(combo))
}

pub async fn create_combo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ComboInput>,
) -> AppResult<(StatusCode, Json<ComboWithItems>)> {
    let service = ComboService::new(state.db.clone());
    let combo = service.create_combo(current_user.0.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(combo)))
}

pub async fn update_combo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(combo_id): Path<Uuid>,
    Json(input): Json<ComboInput>,
) -> AppResult<Json<ComboWithItems>> {
    let service = ComboService::new(state.db.clone());
    let combo = service
        .update_combo(current_user.0.user_id, combo_id, input)
        .await?;
    Ok(Json(combo))
}

pub async fn delete_combo(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(combo_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ComboService::new(state.db.clone());
    service.delete_combo(current_user.0.user_id, combo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Units of the combo the current stock can assemble
pub async fn get_combo_availability(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(combo_id): Path<Uuid>,
) -> AppResult<Json<ComboAvailability>> {
    let service = ComboService::new(state.db.clone());
    let availability = service
        .get_availability(current_user.0.user_id, combo_id)
        .await?;
    Ok(Json(availability))
}
