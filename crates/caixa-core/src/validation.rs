//! # Validation Module
//!
//! Input validation utilities for the Caixa ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin / POS forms (external)                                 │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: caixa-ledger services                                        │
//! │  ├── Actor check                                                       │
//! │  └── THIS MODULE: Business rule validation, before any I/O             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (amount > 0, paid ≤ amount)                     │
//! │  ├── UNIQUE (tenant_id, idempotency_key)                               │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::validation::{validate_installment_count, validate_quantity};
//!
//! validate_quantity(5).unwrap();
//! validate_installment_count(12, 60).unwrap();
//! assert!(validate_installment_count(0, 60).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_ITEM_QUANTITY, MAX_SALE_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted idempotency key.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Longest accepted free-text description or note.
pub const MAX_DESCRIPTION_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer reference.
///
/// ## Rules
/// - Must not be blank
/// - At most 64 characters
pub fn validate_customer_id(customer_id: &str) -> ValidationResult<()> {
    let customer_id = customer_id.trim();

    if customer_id.is_empty() {
        return Err(ValidationError::Required {
            field: "customer_id".to_string(),
        });
    }

    if customer_id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "customer_id".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a payment idempotency key.
///
/// ## Rules
/// - Must not be blank (a key is mandatory for every payment)
/// - At most [`MAX_IDEMPOTENCY_KEY_LEN`] characters
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_idempotency_key;
///
/// assert!(validate_idempotency_key("pay-2025-03-01-0001").is_ok());
/// assert!(validate_idempotency_key("  ").is_err());
/// ```
pub fn validate_idempotency_key(key: &str) -> ValidationResult<()> {
    let key = key.trim();

    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "idempotency_key".to_string(),
        });
    }

    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(ValidationError::TooLong {
            field: "idempotency_key".to_string(),
            max: MAX_IDEMPOTENCY_KEY_LEN,
        });
    }

    Ok(())
}

/// Validates optional free text (notes, ledger descriptions).
pub fn validate_description(field: &str, text: &str) -> ValidationResult<()> {
    if text.len() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout: Commit Sale                                                  │
/// │                                                                         │
/// │  Line: product P, quantity 5                                           │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → Stock check                                             │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates an installment count against the configured ceiling.
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_installment_count;
///
/// assert!(validate_installment_count(1, 60).is_ok());
/// assert!(validate_installment_count(61, 60).is_err());
/// ```
pub fn validate_installment_count(count: u32, max: u32) -> ValidationResult<()> {
    if count == 0 || count > max {
        return Err(ValidationError::OutOfRange {
            field: "installment_count".to_string(),
            min: 1,
            max: max as i64,
        });
    }

    Ok(())
}

/// Validates a down payment against the sale total.
///
/// ## Rules
/// - Must be non-negative
/// - Must be strictly less than the total (something must be financed)
pub fn validate_down_payment(down: Money, total: Money) -> ValidationResult<()> {
    if down.is_negative() || down >= total {
        return Err(ValidationError::OutOfRange {
            field: "down_payment".to_string(),
            min: 0,
            max: total.cents() - 1,
        });
    }

    Ok(())
}

/// Validates the cash actually received for a sale.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed the sale total
pub fn validate_amount_received(received: Money, total: Money) -> ValidationResult<()> {
    if !received.is_positive() || received > total {
        return Err(ValidationError::OutOfRange {
            field: "actual_amount_received".to_string(),
            min: 1,
            max: total.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a sale.
///
/// ## Rules
/// - At least one line
/// - At most MAX_SALE_LINES (100)
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use caixa_core::validation::validate_uuid;
///
/// assert!(validate_uuid("product_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("product_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
