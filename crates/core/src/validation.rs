//! Field-level input validation.
//!
//! Every create/update input is checked here before the data layer opens a
//! transaction, so malformed input never reaches the store.

use invoicely_shared::AppError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Minimum username length.
pub const USERNAME_MIN_LEN: usize = 3;
/// Maximum username length.
pub const USERNAME_MAX_LEN: usize = 32;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Normalizes and validates an email address.
///
/// Returns the trimmed, lower-cased address.
pub fn normalize_email(email: &str) -> Result<String, FieldError> {
    let email = email.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(FieldError::new("email", "must contain '@'"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(FieldError::new("email", "is not a valid address"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(FieldError::new("email", "must not contain whitespace"));
    }
    Ok(email)
}

/// Normalizes and validates a username.
///
/// Usernames are trimmed and must be 3 to 32 characters of ASCII letters,
/// digits, `_`, `-` or `.`.
pub fn normalize_username(username: &str) -> Result<String, FieldError> {
    let username = username.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(FieldError::new(
            "username",
            format!("must be {USERNAME_MIN_LEN} to {USERNAME_MAX_LEN} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(FieldError::new(
            "username",
            "may only contain letters, digits, '_', '-' and '.'",
        ));
    }
    Ok(username.to_string())
}

/// Rejects blank strings, returning the trimmed value.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::new(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Rejects negative amounts.
pub fn require_non_negative(field: &'static str, amount: Decimal) -> Result<Decimal, FieldError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(FieldError::new(field, "must not be negative"));
    }
    Ok(amount)
}

/// Rejects zero and negative amounts.
pub fn require_positive(field: &'static str, amount: Decimal) -> Result<Decimal, FieldError> {
    if amount <= Decimal::ZERO {
        return Err(FieldError::new(field, "must be greater than zero"));
    }
    Ok(amount)
}

/// Validates an ISO 4217 style currency code, returning it upper-cased.
pub fn normalize_currency(code: &str) -> Result<String, FieldError> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FieldError::new("currency", "must be a three-letter code"));
    }
    Ok(code)
}
