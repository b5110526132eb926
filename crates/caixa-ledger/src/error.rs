//! # Ledger Error Types
//!
//! What a request handler sees when a ledger operation fails.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LedgerError Categories                            │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │    FixInput      │  │   RetryLater     │  │   NotFound           │  │
//! │  │                  │  │                  │  │                      │  │
//! │  │ Validation       │  │ Conflict         │  │ NotFound             │  │
//! │  │ InsufficientStock│  │ Persistence      │  │                      │  │
//! │  │ Overpayment      │  │                  │  ├──────────────────────┤  │
//! │  │ DuplicatePayment │  │                  │  │   Unauthorized       │  │
//! │  │                  │  │                  │  │ Authentication       │  │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────────┘  │
//! │                                                                         │
//! │  ValidationError ─┐                                                    │
//! │  CoreError ───────┼──► LedgerError ──► category() / code()             │
//! │  DbError ─────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use caixa_core::{CoreError, Money, ValidationError};
use caixa_db::DbError;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One sale line that cannot be served from current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockShortfall {
    pub product_id: String,
    pub product_name: String,
    pub requested: i64,
    pub available: i64,
}

/// Ledger operation errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Caller input broke a business rule. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// One or more lines ask for more units than are in stock.
    ///
    /// Carries every failing line, not just the first one, so the checkout
    /// form can flag them all at once.
    #[error("Insufficient stock for {} product(s)", .shortfalls.len())]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// A payment larger than what is still owed on the installment.
    #[error("Payment of {requested} exceeds remaining balance {remaining}")]
    Overpayment { requested: Money, remaining: Money },

    /// Entity missing, or owned by another tenant.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// No actor identity was supplied.
    #[error("Authentication required")]
    Authentication,

    /// A versioned row changed between read and write.
    #[error("{entity} {id} was modified concurrently, reload and retry")]
    Conflict { entity: String, id: String },

    /// The idempotency key was already used by an accepted payment.
    #[error("Idempotency key '{idempotency_key}' already used by payment {payment_id}")]
    DuplicatePayment {
        idempotency_key: String,
        payment_id: String,
    },

    /// Storage failed underneath the operation.
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

/// How a caller should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Change the request before sending it again.
    FixInput,
    /// The same request may succeed later.
    RetryLater,
    NotFound,
    Unauthorized,
}

impl LedgerError {
    /// Creates a not found error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        LedgerError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates a validation error for a field not allowed in this context.
    pub fn not_allowed(field: &str, reason: impl Into<String>) -> Self {
        LedgerError::Validation(ValidationError::NotAllowed {
            field: field.to_string(),
            reason: reason.into(),
        })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::Validation(_)
            | LedgerError::InsufficientStock { .. }
            | LedgerError::Overpayment { .. }
            | LedgerError::DuplicatePayment { .. } => ErrorCategory::FixInput,
            LedgerError::Conflict { .. } | LedgerError::Persistence(_) => ErrorCategory::RetryLater,
            LedgerError::NotFound { .. } => ErrorCategory::NotFound,
            LedgerError::Authentication => ErrorCategory::Unauthorized,
        }
    }

    /// Machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "VALIDATION_ERROR",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::Overpayment { .. } => "OVERPAYMENT",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::Authentication => "UNAUTHORIZED",
            LedgerError::Conflict { .. } => "CONFLICT",
            LedgerError::DuplicatePayment { .. } => "DUPLICATE_PAYMENT",
            LedgerError::Persistence(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::RetryLater
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::Conflict { entity, id } => LedgerError::Conflict { entity, id },
            other => LedgerError::Persistence(other),
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Overpayment {
                requested,
                remaining,
            } => LedgerError::Overpayment {
                requested,
                remaining,
            },
            CoreError::InstallmentNotPayable {
                installment_id,
                status,
            } => LedgerError::not_allowed(
                "installment",
                format!("installment {} is {}", installment_id, status),
            ),
            CoreError::Validation(e) => LedgerError::Validation(e),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Persistence(DbError::from(err))
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Write(String),

    /// A value parsed but is outside what the ledger accepts.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Write(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Write(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_core::InstallmentStatus;

    #[test]
    fn test_db_errors_map_to_ledger_errors() {
        let err: LedgerError = DbError::not_found("Sale", "s-1").into();
        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(err.category(), ErrorCategory::NotFound);

        let err: LedgerError = DbError::conflict("Installment", "i-1").into();
        assert!(matches!(err, LedgerError::Conflict { .. }));
        assert!(err.is_retryable());

        let err: LedgerError = DbError::QueryFailed("disk I/O error".into()).into();
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_core_errors_map_to_ledger_errors() {
        let err: LedgerError = CoreError::Overpayment {
            requested: Money::from_cents(15_100),
            remaining: Money::from_cents(15_000),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::FixInput);
        assert_eq!(err.to_string(), "Payment of 151.00 exceeds remaining balance 150.00");

        let err: LedgerError = CoreError::InstallmentNotPayable {
            installment_id: "i-1".into(),
            status: InstallmentStatus::Cancelled,
        }
        .into();
        assert!(matches!(err, LedgerError::Validation(ValidationError::NotAllowed { .. })));
    }

    #[test]
    fn test_insufficient_stock_message_counts_lines() {
        let shortfall = |id: &str| StockShortfall {
            product_id: id.into(),
            product_name: "Camiseta".into(),
            requested: 3,
            available: 1,
        };
        let err = LedgerError::InsufficientStock {
            shortfalls: vec![shortfall("p-1"), shortfall("p-2")],
        };
        assert_eq!(err.to_string(), "Insufficient stock for 2 product(s)");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_authentication_is_unauthorized() {
        assert_eq!(LedgerError::Authentication.category(), ErrorCategory::Unauthorized);
    }
}
