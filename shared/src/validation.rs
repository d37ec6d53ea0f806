//! Validation utilities for the Food Back-Office Platform
//!
//! Plain functions return `&'static str` messages the way the handlers expect;
//! the `*_rule` wrappers adapt them for `#[validate(custom = "...")]`.

use rust_decimal::Decimal;
use validator::ValidationError;

// ============================================================================
// Account Validations
// ============================================================================

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 12;

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password length (6 to 12 characters)
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err("Password must be at least 6 characters");
    }
    if len > PASSWORD_MAX_LEN {
        return Err("Password must be at most 12 characters");
    }
    Ok(())
}

// ============================================================================
// Record Validations
// ============================================================================

/// Validate a phone number: 8 to 15 digits, separators allowed
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    if phone
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '+' | '.')))
    {
        return Err("Phone number contains invalid characters");
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(8..=15).contains(&digits) {
        return Err("Phone number must have between 8 and 15 digits");
    }
    Ok(())
}

/// Validate an on-hand or threshold quantity
pub fn validate_stock_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity < 0 {
        return Err("Quantity cannot be negative");
    }
    Ok(())
}

/// Validate an order line or combo component quantity
pub fn validate_line_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate a price or fee
pub fn validate_price(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate the amount of a manually entered transaction
pub fn validate_transaction_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount <= Decimal::ZERO {
        return Err("Amount must be greater than zero");
    }
    Ok(())
}

/// Trim an optional text field, mapping blank input to `None`
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// validator adapters
// ============================================================================

fn rule(code: &'static str, result: Result<(), &'static str>) -> Result<(), ValidationError> {
    result.map_err(|message| {
        let mut error = ValidationError::new(code);
        error.message = Some(message.into());
        error
    })
}

pub fn email_rule(email: &str) -> Result<(), ValidationError> {
    rule("email", validate_email(email))
}

pub fn password_rule(password: &str) -> Result<(), ValidationError> {
    rule("password", validate_password(password))
}

pub fn phone_rule(phone: &str) -> Result<(), ValidationError> {
    rule("phone", validate_phone(phone))
}

pub fn price_rule(amount: &Decimal) -> Result<(), ValidationError> {
    rule("amount", validate_price(*amount))
}

pub fn transaction_amount_rule(amount: &Decimal) -> Result<(), ValidationError> {
    rule("amount", validate_transaction_amount(*amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("owner@example.com").is_ok());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("owner@localhost").is_err());
        assert!(validate_email("owner@example.").is_err());
    }

    #[test]
    fn test_validate_password_bounds() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("123456789012").is_ok());
        assert!(validate_password("1234567890123").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("(11) 98765-4321").is_ok());
        assert!(validate_phone("+55 11 98765 4321").is_ok());
        assert!(validate_phone("1234").is_err());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_quantities() {
        assert!(validate_stock_quantity(0).is_ok());
        assert!(validate_stock_quantity(-1).is_err());
        assert!(validate_line_quantity(1).is_ok());
        assert!(validate_line_quantity(0).is_err());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::new(-1, 2)).is_err());
        assert!(validate_transaction_amount(Decimal::new(1, 2)).is_ok());
        assert!(validate_transaction_amount(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" Rua A ".into())), Some("Rua A".into()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_rule_carries_message() {
        let err = phone_rule("12").unwrap_err();
        assert_eq!(err.code, "phone");
        assert!(err.message.is_some());
    }
}
