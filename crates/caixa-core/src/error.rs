//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caixa-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caixa-ledger errors (services)                                        │
//! │  └── LedgerError      - What request handlers see                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;
use crate::types::InstallmentStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Rule violations found by the pure ledger functions.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payment would push `paid_amount` past the installment amount.
    ///
    /// ## User Workflow
    /// ```text
    /// Installment: 300.00, already paid 150.00
    ///      │
    ///      ▼
    /// apply 151.00
    ///      │
    ///      ▼
    /// Overpayment { remaining: 150.00 }
    ///      │
    ///      ▼
    /// UI shows: "Maximum accepted for this installment: 150.00"
    /// ```
    #[error("Payment of {requested} exceeds remaining balance {remaining}")]
    Overpayment { requested: Money, remaining: Money },

    /// The installment is in a state that does not accept payments.
    #[error("Installment {installment_id} is {status}, cannot accept payment")]
    InstallmentNotPayable {
        installment_id: String,
        status: InstallmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Rejected caller input. Raised before anything is read or written.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Quantities, installment counts, forecast horizons.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Unparseable amounts and dates, inverted ranges.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Schedule fields on a cash sale, reserved ledger categories.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
