//! Route definitions for the Food Back-Office Platform

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Room for multipart boundaries and headers around the receipt itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes(&state))
        // Protected routes
        .nest("/customers", customer_routes(&state))
        .nest("/stock", stock_routes(&state))
        .nest("/combos", combo_routes(&state))
        .nest("/orders", order_routes(&state))
        .nest("/finance", finance_routes(&state))
        .nest("/dashboard", dashboard_routes(&state))
        .nest("/changes", change_routes(&state))
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .merge(protected)
}

/// Customer routes (protected)
fn customer_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_customers).post(handlers::create_customer))
        .route(
            "/:customer_id",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::delete_customer),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Stock routes (protected)
fn stock_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/low", get(handlers::list_low_stock))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/quantity", put(handlers::set_product_quantity))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Combo routes (protected)
fn combo_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_combos).post(handlers::create_combo))
        .route(
            "/:combo_id",
            get(handlers::get_combo)
                .put(handlers::update_combo)
                .delete(handlers::delete_combo),
        )
        .route("/:combo_id/availability", get(handlers::get_combo_availability))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Order routes (protected)
fn order_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/today", get(handlers::list_todays_orders))
        .route("/recent", get(handlers::list_recent_orders))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/status", put(handlers::update_order_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Finance routes (protected)
fn finance_routes(state: &AppState) -> Router<AppState> {
    let receipt_limit = state.config.storage.max_receipt_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/export", get(handlers::export_transactions))
        .route(
            "/transactions/:transaction_id",
            delete(handlers::delete_transaction),
        )
        .route(
            "/transactions/:transaction_id/receipt",
            post(handlers::upload_receipt)
                .get(handlers::download_receipt)
                .layer(DefaultBodyLimit::max(receipt_limit)),
        )
        .route("/summary", get(handlers::get_finance_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Dashboard routes (protected)
fn dashboard_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::get_dashboard_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Change feed (protected)
fn change_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::stream_changes))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
