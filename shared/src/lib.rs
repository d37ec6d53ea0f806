//! Shared types and models for the Food Back-Office Platform
//!
//! This crate contains the domain types and the order fulfillment rules
//! shared between the backend, the browser UI (via WASM) and the tests.

pub mod fulfillment;
pub mod models;
pub mod types;
pub mod validation;

pub use fulfillment::*;
pub use models::*;
pub use types::*;
pub use validation::*;
