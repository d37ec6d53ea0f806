//! HTTP request handlers

pub mod auth;
pub mod combo;
pub mod customer;
pub mod dashboard;
pub mod finance;
pub mod health;
pub mod order;
pub mod realtime;
pub mod stock;

pub use auth::*;
pub use combo::*;
pub use customer::*;
pub use dashboard::*;
pub use finance::*;
pub use health::*;
pub use order::*;
pub use realtime::*;
pub use stock::*;
