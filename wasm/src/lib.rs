//! WebAssembly module for the Food Back-Office Platform
//!
//! Provides client-side computation for:
//! - Stock status badges
//! - Order totals while the order form is being filled
//! - Combo expansion and availability previews
//! - Order codes and input validation

use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("food-backoffice wasm ready"));
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

/// Stock status (`ok`, `low` or `critical`) for a quantity and its minimum
#[wasm_bindgen]
pub fn stock_status(quantity: i32, min_quantity: i32) -> String {
    StockStatus::classify(quantity, min_quantity).to_string()
}

/// Order total from `[{unit_price, quantity}]` plus the delivery fee, as a
/// decimal string
#[wasm_bindgen]
pub fn order_total_json(lines_json: &str, delivery_fee: &str) -> Result<String, JsValue> {
    let lines: Vec<PricedLine> =
        serde_json::from_str(lines_json).map_err(|e| js_error("Invalid lines JSON", e))?;
    let fee: Decimal = delivery_fee
        .trim()
        .parse()
        .map_err(|e| js_error("Invalid delivery fee", e))?;
    if let Err(message) = validate_price(fee) {
        return Err(JsValue::from_str(message));
    }
    Ok(order_total(&lines, fee).to_string())
}

/// Product requirements for `units` of a combo given its components JSON
#[wasm_bindgen]
pub fn expand_combo_json(components_json: &str, units: i32) -> Result<String, JsValue> {
    if let Err(message) = validate_line_quantity(units) {
        return Err(JsValue::from_str(message));
    }
    let components: Vec<ComboComponent> = serde_json::from_str(components_json)
        .map_err(|e| js_error("Invalid components JSON", e))?;
    let expanded =
        shared::scale_components(&components, units).map_err(|e| js_error("Expansion failed", e))?;
    serde_json::to_string(&expanded).map_err(|e| js_error("Serialization failed", e))
}

/// Whole combos current stock can assemble; `on_hand_json` maps product id
/// to quantity
#[wasm_bindgen]
pub fn combo_availability_json(components_json: &str, on_hand_json: &str) -> Result<i32, JsValue> {
    let components: Vec<ComboComponent> = serde_json::from_str(components_json)
        .map_err(|e| js_error("Invalid components JSON", e))?;
    let on_hand: HashMap<Uuid, i32> =
        serde_json::from_str(on_hand_json).map_err(|e| js_error("Invalid stock JSON", e))?;
    Ok(combo_availability(&components, &on_hand))
}

/// Display code for an order number, e.g. `PED-0042`
#[wasm_bindgen]
pub fn order_code(order_number: u32) -> String {
    format_order_code(i64::from(order_number))
}

/// Status names in workflow order
#[wasm_bindgen]
pub fn order_statuses() -> js_sys::Array {
    OrderStatus::ALL
        .iter()
        .map(|status| JsValue::from_str(status.as_str()))
        .collect()
}

/// Validation message for a phone number, or `None` when it is valid
#[wasm_bindgen]
pub fn phone_error(phone: &str) -> Option<String> {
    validate_phone(phone).err().map(str::to_string)
}

/// Validation message for a password, or `None` when it is valid
#[wasm_bindgen]
pub fn password_error(password: &str) -> Option<String> {
    validate_password(password).err().map(str::to_string)
}
