//! # Validation Module
//!
//! Input validation for requests reaching the coordinator. These checks
//! run before any business logic; the database's NOT NULL / CHECK
//! constraints are the last line of defense behind them.

use crate::error::ValidationError;
use crate::types::PaymentMap;
use crate::{MAX_LINE_QUANTITY, MAX_SALE_LINES};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a SKU: non-empty, ≤ 50 chars, alphanumeric plus `-`/`_`.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required { field: "sku".to_string() });
    }
    if sku.len() > 50 {
        return Err(ValidationError::TooLong { field: "sku".to_string(), max: 50 });
    }
    if !sku.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "solo letras, números, guiones y guiones bajos".to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity: positive and within the fat-finger guard.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive { field: "cantidad".to_string() });
    }
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "cantidad".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a unit price in cents. Zero is allowed (promotional items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "precio".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates the number of lines on a sale or layaway.
pub fn validate_line_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required { field: "items".to_string() });
    }
    if count > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }
    Ok(())
}

/// Validates a payment map: at least one entry, every amount positive.
pub fn validate_payments(payments: &PaymentMap) -> ValidationResult<()> {
    if payments.is_empty() {
        return Err(ValidationError::Required { field: "metodo_pago".to_string() });
    }
    for (label, amount) in payments {
        if label.trim().is_empty() {
            return Err(ValidationError::Required { field: "metodo_pago".to_string() });
        }
        if *amount <= 0 {
            return Err(ValidationError::MustBePositive {
                field: format!("metodo_pago.{label}"),
            });
        }
    }
    Ok(())
}

/// Validates an entity id as UUID.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required { field: "id".to_string() });
    }
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "debe ser un UUID válido".to_string(),
    })?;
    Ok(())
}

/// Trims and bounds a search query. Empty is fine (default listing).
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    if query.len() > 100 {
        return Err(ValidationError::TooLong { field: "q".to_string(), max: 100 });
    }
    Ok(query.to_string())
}
