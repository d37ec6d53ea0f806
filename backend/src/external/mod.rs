//! Integrations outside the database

pub mod receipt_storage;

pub use receipt_storage::ReceiptStorage;
