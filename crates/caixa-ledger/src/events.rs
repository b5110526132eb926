//! # Domain Events
//!
//! Side effects of a committed sale are explicit events, delivered two ways.
//!
//! ## Event Delivery
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Domain Event Delivery                                │
//! │                                                                         │
//! │  commit transaction                                                     │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │ sale + items + schedule + cash entry                              │ │
//! │  │      │                                                            │ │
//! │  │      ▼                                                            │ │
//! │  │ SaleEventHandler::on_sale_committed  (same connection)            │ │
//! │  │   ├── StockDecrementHandler    guarded UPDATE per line            │ │
//! │  │   └── CustomerAggregateHandler purchase_count / total_spent       │ │
//! │  │      │                                                            │ │
//! │  │      ▼                                                            │ │
//! │  │ ledger_outbox INSERT                                              │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │         │ COMMIT                                                        │
//! │         ▼                                                               │
//! │  dispatch_pending ──► OutboxSubscriber::deliver (notifications, ...)   │
//! │                       ok  → mark_dispatched                            │
//! │                       err → attempts += 1, retried next run            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A handler error aborts the whole commit. A subscriber error only delays
//! delivery of that one event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, warn};

use caixa_core::{LedgerOutboxEntry, Money, PaymentMethod};
use caixa_db::repository::customer::CustomerAggregateRepository;
use caixa_db::repository::product::ProductRepository;
use caixa_db::Database;

use crate::error::{LedgerError, LedgerResult, StockShortfall};

/// Deliveries attempted before an event is left for manual inspection.
pub const MAX_DELIVERY_ATTEMPTS: i64 = 10;

// =============================================================================
// Events
// =============================================================================

/// One line of a committed sale, after duplicate lines were merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCommitted {
    pub tenant_id: String,
    pub sale_id: String,
    pub customer_id: String,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub installment_count: u32,
    pub lines: Vec<CommittedLine>,
    pub committed_by: String,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleCancelled {
    pub tenant_id: String,
    pub sale_id: String,
    pub cancelled_installments: u64,
    pub cancelled_by: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPaymentApplied {
    pub tenant_id: String,
    pub installment_id: String,
    pub sale_id: String,
    pub payment_id: String,
    pub amount: Money,
    pub remaining: Money,
    pub settled: bool,
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
}

/// Everything the ledger announces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    SaleCommitted(SaleCommitted),
    SaleCancelled(SaleCancelled),
    InstallmentPaymentApplied(InstallmentPaymentApplied),
}

impl DomainEvent {
    /// Name stored in `ledger_outbox.event_type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::SaleCommitted(_) => "sale_committed",
            DomainEvent::SaleCancelled(_) => "sale_cancelled",
            DomainEvent::InstallmentPaymentApplied(_) => "installment_payment_applied",
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            DomainEvent::SaleCommitted(e) => &e.tenant_id,
            DomainEvent::SaleCancelled(e) => &e.tenant_id,
            DomainEvent::InstallmentPaymentApplied(e) => &e.tenant_id,
        }
    }

    /// Sale or installment the event is about.
    pub fn aggregate_id(&self) -> &str {
        match self {
            DomainEvent::SaleCommitted(e) => &e.sale_id,
            DomainEvent::SaleCancelled(e) => &e.sale_id,
            DomainEvent::InstallmentPaymentApplied(e) => &e.installment_id,
        }
    }

    /// Decodes an outbox row back into the event it carries.
    pub fn from_outbox(entry: &LedgerOutboxEntry) -> LedgerResult<Self> {
        Ok(serde_json::from_str(&entry.payload)?)
    }
}

// =============================================================================
// In-Transaction Handlers
// =============================================================================

/// Reacts to a sale inside its commit transaction.
///
/// Returning an error rolls back the sale.
#[async_trait]
pub trait SaleEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_sale_committed(
        &self,
        conn: &mut SqliteConnection,
        event: &SaleCommitted,
    ) -> LedgerResult<()>;
}

/// Takes the sold units out of stock.
///
/// Every line is attempted so the error lists all lines that lost their
/// stock to a concurrent sale since the snapshot was read.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockDecrementHandler;

#[async_trait]
impl SaleEventHandler for StockDecrementHandler {
    fn name(&self) -> &'static str {
        "stock_decrement"
    }

    async fn on_sale_committed(
        &self,
        conn: &mut SqliteConnection,
        event: &SaleCommitted,
    ) -> LedgerResult<()> {
        let mut shortfalls = Vec::new();

        for line in &event.lines {
            let decremented = ProductRepository::decrement_stock_with_tx(
                conn,
                &event.tenant_id,
                &line.product_id,
                line.quantity,
                event.committed_at,
            )
            .await?;

            if !decremented {
                let available =
                    ProductRepository::stock_of_with_tx(conn, &event.tenant_id, &line.product_id)
                        .await?
                        .unwrap_or(0);
                shortfalls.push(StockShortfall {
                    product_id: line.product_id.clone(),
                    product_name: line.product_name.clone(),
                    requested: line.quantity,
                    available,
                });
            }
        }

        if !shortfalls.is_empty() {
            warn!(
                sale_id = %event.sale_id,
                lines = shortfalls.len(),
                "Stock changed since snapshot, aborting sale"
            );
            return Err(LedgerError::InsufficientStock { shortfalls });
        }

        Ok(())
    }
}

/// Keeps the customer's purchase count and lifetime spend current.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerAggregateHandler;

#[async_trait]
impl SaleEventHandler for CustomerAggregateHandler {
    fn name(&self) -> &'static str {
        "customer_aggregate"
    }

    async fn on_sale_committed(
        &self,
        conn: &mut SqliteConnection,
        event: &SaleCommitted,
    ) -> LedgerResult<()> {
        CustomerAggregateRepository::record_purchase_with_tx(
            conn,
            &event.tenant_id,
            &event.customer_id,
            event.total.cents(),
            event.committed_at,
        )
        .await?;
        Ok(())
    }
}

/// Handlers every ledger runs unless replaced.
pub fn default_handlers() -> Vec<Arc<dyn SaleEventHandler>> {
    vec![Arc::new(StockDecrementHandler), Arc::new(CustomerAggregateHandler)]
}

// =============================================================================
// Outbox Delivery
// =============================================================================

/// Receives committed events from the outbox.
///
/// Delivery is at least once: a subscriber may see an event again after a
/// crash between delivery and `mark_dispatched`.
#[async_trait]
pub trait OutboxSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &DomainEvent) -> Result<(), String>;
}

/// Logs every event at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSubscriber;

#[async_trait]
impl OutboxSubscriber for LogSubscriber {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, event: &DomainEvent) -> Result<(), String> {
        info!(
            event_type = event.event_type(),
            tenant_id = %event.tenant_id(),
            aggregate_id = %event.aggregate_id(),
            "Ledger event"
        );
        Ok(())
    }
}

/// Outcome of one [`dispatch_pending`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Undelivered entries at [`MAX_DELIVERY_ATTEMPTS`], no longer retried.
    pub skipped: usize,
}

/// Delivers up to `limit` undelivered outbox entries to every subscriber.
///
/// An entry is marked dispatched only when all subscribers accept it.
pub async fn dispatch_pending(
    db: &Database,
    subscribers: &[Arc<dyn OutboxSubscriber>],
    limit: u32,
) -> LedgerResult<DispatchReport> {
    let outbox = db.outbox();
    let entries = outbox.get_pending(limit, MAX_DELIVERY_ATTEMPTS).await?;
    let mut report = DispatchReport::default();

    let exhausted = outbox.count_exhausted(MAX_DELIVERY_ATTEMPTS).await?;
    if exhausted > 0 {
        warn!(
            count = exhausted,
            max_attempts = MAX_DELIVERY_ATTEMPTS,
            "Events exceeded max delivery attempts and are no longer retried"
        );
    }
    report.skipped = exhausted as usize;

    if entries.is_empty() {
        debug!("No pending ledger events");
        return Ok(report);
    }

    for entry in entries {
        let event = match DomainEvent::from_outbox(&entry) {
            Ok(event) => event,
            Err(e) => {
                outbox.mark_failed(&entry.id, &e.to_string()).await?;
                report.failed += 1;
                continue;
            }
        };

        let mut failure = None;
        for subscriber in subscribers {
            if let Err(e) = subscriber.deliver(&event).await {
                failure = Some(format!("{}: {}", subscriber.name(), e));
                break;
            }
        }

        match failure {
            None => {
                outbox.mark_dispatched(&entry.id).await?;
                report.delivered += 1;
            }
            Some(reason) => {
                warn!(id = %entry.id, reason = %reason, "Event delivery failed");
                outbox.mark_failed(&entry.id, &reason).await?;
                report.failed += 1;
            }
        }
    }

    info!(
        delivered = report.delivered,
        failed = report.failed,
        skipped = report.skipped,
        "Dispatched ledger events"
    );
    Ok(report)
}
