//! Food Back-Office Platform - Backend
//!
//! Order management, stock, combos, finance and customer records for a small
//! food-sales business, served as a JSON API over PostgreSQL.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod middleware;
pub mod realtime;
pub mod routes;
pub mod services;

pub use config::Config;
pub use realtime::ChangeFeed;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub changes: ChangeFeed,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let changes = ChangeFeed::new(config.realtime.buffer);
        Self {
            db,
            config: Arc::new(config),
            changes,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Food Back-Office Platform API v1.0"
}
