//! Dashboard handlers

use axum::{extract::State, Json};
use chrono::Utc;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::DashboardStats;
use crate::services::ReportingService;
use crate::AppState;

/// Headline figures for today and the current month
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardStats>> {
    let service = ReportingService::new(state.db.clone());
    let stats = service
        .get_dashboard_stats(current_user.0.user_id, Utc::now().date_naive())
        .await?;
    Ok(Json(stats))
}
