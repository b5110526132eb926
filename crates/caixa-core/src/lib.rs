//! # caixa-core: Pure Ledger Logic for Caixa
//!
//! This crate is the **heart** of the sales & receivables ledger. It holds
//! every money rule as a pure function with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caixa Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Admin / POS request handlers (external)            │   │
//! │  │    checkout form ──► payment modal ──► dashboards               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                caixa-ledger (services)                          │   │
//! │  │    commit_sale, apply_payment, sweep_overdue, forecast          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caixa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │ schedule │ │ payment │ │aggregate│ │   │
//! │  │   │  Sale   │ │  Money  │ │ generate │ │ apply   │ │ summary │ │   │
//! │  │   │ Install.│ │  cents  │ │ months   │ │ settle  │ │forecast │ │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    caixa-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, Installment, CashFlowEntry, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`schedule`] - Installment schedule generator
//! - [`payment`] - Installment payment state transition
//! - [`aggregate`] - Cash-flow summaries, receivables and forecasts
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::money::Money;
//! use caixa_core::schedule::generate_schedule;
//! use chrono::NaiveDate;
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
//! let schedule = generate_schedule(
//!     "sale-1",
//!     Money::from_cents(100_000),
//!     Money::zero(),
//!     3,
//!     start,
//! )
//! .unwrap();
//!
//! // 1000.00 over 3 → 333.33, 333.33, 333.34
//! let amounts: Vec<i64> = schedule.iter().map(|i| i.amount.cents()).collect();
//! assert_eq!(amounts, vec![33_333, 33_333, 33_334]);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod aggregate;
pub mod error;
pub mod money;
pub mod payment;
pub mod schedule;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-store deployments.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum quantity of a single line in a sale.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines in a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Hard upper bound on installments per credit sale (five years, monthly).
pub const MAX_INSTALLMENTS: u32 = 60;
