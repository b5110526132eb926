//! # caixa-ledger: Sales & Receivables Services
//!
//! The orchestration layer of the Caixa ledger. Request handlers build a
//! [`Ledger`] once and call its operations with the caller's [`Actor`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caixa Ledger Services                            │
//! │                                                                         │
//! │  request handler (admin / POS)                                         │
//! │       │  Actor { user_id, tenant_id }                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 caixa-ledger (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │  sale ─────────── commit_sale, cancel_sale, get_sale            │   │
//! │  │  payment ──────── apply_payment                                 │   │
//! │  │  sweep ────────── sweep_overdue                                 │   │
//! │  │  cash_flow ────── summary, metrics, forecast, record_entry      │   │
//! │  │  events ───────── in-tx handlers, outbox dispatch               │   │
//! │  │                                                                 │   │
//! │  │  seams: Clock, StockOracle, SaleEventHandler, OutboxSubscriber  │   │
//! │  └───────────────┬─────────────────────────────┬───────────────────┘   │
//! │                  ▼                             ▼                        │
//! │           caixa-core (rules)            caixa-db (SQLite)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use caixa_ledger::{Ledger, LedgerConfig};
//!
//! let ledger = Ledger::open(LedgerConfig::load(None)?).await?;
//! let committed = ledger.commit_sale(&actor, request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cash_flow;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod payment;
pub mod sale;
pub mod stock;
pub mod sweep;

// =============================================================================
// Re-exports
// =============================================================================

pub use cash_flow::NewCashFlowEntry;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{ConfigError, ErrorCategory, LedgerError, LedgerResult, StockShortfall};
pub use events::{DomainEvent, OutboxSubscriber, SaleEventHandler};
pub use payment::{AppliedPayment, PaymentRequest};
pub use sale::{CancelledSale, CommitSaleRequest, CommittedSale, SaleDetails, SaleLine};
pub use stock::{ProductSnapshot, StockOracle};

use std::sync::Arc;

use caixa_core::Actor;
use caixa_db::Database;
use tracing::error;

use crate::events::default_handlers;
use crate::stock::SqliteStockOracle;

/// Handle to the ledger services.
///
/// Cheap to clone; clones share the pool, config, clock and handlers.
#[derive(Clone)]
pub struct Ledger {
    db: Database,
    config: Arc<LedgerConfig>,
    clock: Arc<dyn Clock>,
    stock: Arc<dyn StockOracle>,
    handlers: Vec<Arc<dyn SaleEventHandler>>,
}

impl Ledger {
    /// Builds a ledger over an open database with the default collaborators:
    /// system clock, `products` table stock oracle, stock decrement and
    /// customer aggregate handlers.
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        let stock = Arc::new(SqliteStockOracle::new(db.products()));
        Ledger {
            db,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            stock,
            handlers: default_handlers(),
        }
    }

    /// Opens (and migrates) the configured database, then builds the ledger.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        let db = Database::new(config.database.to_db_config()).await?;
        Ok(Self::new(db, config))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_stock_oracle(mut self, oracle: impl StockOracle + 'static) -> Self {
        self.stock = Arc::new(oracle);
        self
    }

    /// Adds a handler that runs after the default ones.
    pub fn with_handler(mut self, handler: impl SaleEventHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field(
                "handlers",
                &self.handlers.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Rejects calls without an identity.
pub(crate) fn ensure_authenticated(actor: &Actor) -> LedgerResult<()> {
    if actor.is_authenticated() {
        Ok(())
    } else {
        Err(LedgerError::Authentication)
    }
}

/// Commits `tx` when `result` is Ok, otherwise rolls it back and returns the
/// original error. A failed rollback is logged; the error returned is still
/// the one that caused it.
pub(crate) async fn finish_tx<T>(
    tx: sqlx::Transaction<'static, sqlx::Sqlite>,
    result: LedgerResult<T>,
    operation: &'static str,
) -> LedgerResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| caixa_db::DbError::TransactionFailed(e.to_string()))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                error!(operation, error = %rollback, cause = %err, "Rollback failed");
            }
            Err(err)
        }
    }
}
