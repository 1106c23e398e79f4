//! Input validation for API requests.
//!
//! Field validators return `Result<(), String>`; handlers convert the
//! message into a 400 via `ApiError::bad_request`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Good-enough email shape check; real verification is out of scope
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();

    /// Phone numbers: digits with optional leading + and separators
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^\+?[0-9][0-9 .\-]{5,19}$").unwrap();
}

/// Validate a person or class display name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate a phone number (optional field)
pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }
        if !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number format".to_string());
        }
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

/// Validate an exam or question score
pub fn validate_score(score: i64) -> Result<(), String> {
    if !(0..=100).contains(&score) {
        return Err("Score must be between 0 and 100".to_string());
    }
    Ok(())
}

pub fn validate_capacity(capacity: i64) -> Result<(), String> {
    if capacity < 1 {
        return Err("Capacity must be at least 1".to_string());
    }
    if capacity > 1000 {
        return Err("Capacity is too large (max 1000)".to_string());
    }
    Ok(())
}

pub fn validate_session_count(sessions: i64) -> Result<(), String> {
    if sessions < 1 {
        return Err("Session count must be at least 1".to_string());
    }
    if sessions > 365 {
        return Err("Session count is too large (max 365)".to_string());
    }
    Ok(())
}

/// Validate a non-negative price in minor currency units (optional field)
pub fn validate_price(price: &Option<i64>) -> Result<(), String> {
    if let Some(p) = price {
        if *p < 0 {
            return Err("Price cannot be negative".to_string());
        }
    }
    Ok(())
}

pub fn validate_discount_percent(percent: i64) -> Result<(), String> {
    if !(0..=100).contains(&percent) {
        return Err("Discount percent must be between 0 and 100".to_string());
    }
    Ok(())
}
