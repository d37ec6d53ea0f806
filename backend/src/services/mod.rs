//! Business logic services for the Food Back-Office Platform

pub mod auth;
pub mod combo;
pub mod customer;
pub mod finance;
pub mod order;
pub mod reporting;
pub mod stock;

pub use auth::AuthService;
pub use combo::ComboService;
pub use customer::CustomerService;
pub use finance::FinanceService;
pub use order::OrderService;
pub use reporting::ReportingService;
pub use stock::StockService;
