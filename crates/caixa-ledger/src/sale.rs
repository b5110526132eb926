//! # Sale Commit Engine
//!
//! Turns a checkout into persisted records in one transaction.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        commit_sale                                      │
//! │                                                                         │
//! │  1. Actor present?                       no ──► Authentication         │
//! │  2. Request valid? (lines, quantities,   no ──► Validation             │
//! │     installment fields only on credit)                                 │
//! │  3. Merge duplicate product lines                                      │
//! │  4. Snapshot every product               unknown ──► NotFound          │
//! │     requested > available on any line?   yes ──► InsufficientStock     │
//! │  5. total = Σ unit_price × quantity                                    │
//! │     credit: generate schedule            bad  ──► Validation           │
//! │                                                                         │
//! │  6. BEGIN                                                              │
//! │       sales, sale_items                                                │
//! │       installments (credit)                                            │
//! │       cash_flow_entries (sale_cash / sale_down_payment)                │
//! │       SaleEventHandlers (stock decrement, customer aggregate)          │
//! │       ledger_outbox ("sale_committed")                                 │
//! │     COMMIT  ── any failure ──► ROLLBACK, no rows left behind          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use caixa_core::schedule::{add_months, generate_schedule, ScheduledInstallment};
use caixa_core::validation::{
    validate_amount_received, validate_customer_id, validate_installment_count, validate_line_count,
    validate_quantity,
};
use caixa_core::{
    Actor, CashFlowEntry, CustomerAggregate, EntryCategory, EntryType, Installment,
    InstallmentStatus, Money, PaymentMethod, ReferenceType, Sale, SaleItem, SaleStatus,
    ValidationError,
};
use caixa_db::{
    CashFlowRepository, DbError, InstallmentRepository, OutboxRepository, SaleRepository,
};

use crate::error::{LedgerError, LedgerResult, StockShortfall};
use crate::events::{CommittedLine, DomainEvent, SaleCancelled, SaleCommitted};
use crate::stock::ProductSnapshot;
use crate::{ensure_authenticated, finish_tx, Ledger};

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

impl SaleLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A checkout as submitted by the caller.
///
/// `installment_count`, `down_payment` and `first_due_date` are only
/// accepted with [`PaymentMethod::Installment`]; `actual_amount_received`
/// only with cash or pix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSaleRequest {
    pub customer_id: String,
    pub lines: Vec<SaleLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub installment_count: Option<u32>,
    #[serde(default)]
    pub down_payment: Option<Money>,
    #[serde(default)]
    pub actual_amount_received: Option<Money>,
    #[serde(default)]
    pub first_due_date: Option<NaiveDate>,
}

impl CommitSaleRequest {
    fn with_method(customer_id: impl Into<String>, lines: Vec<SaleLine>, method: PaymentMethod) -> Self {
        CommitSaleRequest {
            customer_id: customer_id.into(),
            lines,
            payment_method: method,
            installment_count: None,
            down_payment: None,
            actual_amount_received: None,
            first_due_date: None,
        }
    }

    pub fn cash(customer_id: impl Into<String>, lines: Vec<SaleLine>) -> Self {
        Self::with_method(customer_id, lines, PaymentMethod::Cash)
    }

    pub fn pix(customer_id: impl Into<String>, lines: Vec<SaleLine>) -> Self {
        Self::with_method(customer_id, lines, PaymentMethod::Pix)
    }

    pub fn installments(customer_id: impl Into<String>, lines: Vec<SaleLine>, count: u32) -> Self {
        CommitSaleRequest {
            installment_count: Some(count),
            ..Self::with_method(customer_id, lines, PaymentMethod::Installment)
        }
    }

    pub fn with_down_payment(mut self, down: Money) -> Self {
        self.down_payment = Some(down);
        self
    }

    pub fn with_first_due_date(mut self, date: NaiveDate) -> Self {
        self.first_due_date = Some(date);
        self
    }

    pub fn with_amount_received(mut self, received: Money) -> Self {
        self.actual_amount_received = Some(received);
        self
    }
}

/// Everything written by a successful commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// Empty unless the sale was paid in installments.
    pub installments: Vec<Installment>,
    /// `sale_cash` or `sale_down_payment` entry, when one was recorded.
    pub cash_entry: Option<CashFlowEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetails {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub installments: Vec<Installment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelledSale {
    pub sale: Sale,
    /// Open installments moved to `cancelled`.
    pub cancelled_installments: u64,
}

// =============================================================================
// Operations
// =============================================================================

impl Ledger {
    /// Commits a sale against live stock.
    ///
    /// ## Errors
    /// * `Authentication` - blank actor
    /// * `Validation` - malformed request or schedule
    /// * `NotFound` - a line names an unknown product
    /// * `InsufficientStock` - every line that cannot be served
    /// * `Persistence` - the transaction failed and was rolled back
    pub async fn commit_sale(
        &self,
        actor: &Actor,
        request: CommitSaleRequest,
    ) -> LedgerResult<CommittedSale> {
        ensure_authenticated(actor)?;
        let lines = validate_request(&request, self.config.sales.max_installments)?;
        let tenant_id = actor.tenant_id.as_str();

        debug!(
            tenant_id = %tenant_id,
            customer_id = %request.customer_id,
            lines = lines.len(),
            method = %request.payment_method,
            "Committing sale"
        );

        let priced = self.price_lines(tenant_id, lines).await?;
        let total: Money = priced
            .iter()
            .map(|(snapshot, qty)| snapshot.unit_price.multiply_quantity(*qty))
            .sum();

        if !total.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "total".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let sale_date = self.clock.today();
        let sale_id = Uuid::new_v4().to_string();
        let down = request.down_payment.unwrap_or_else(Money::zero);
        let installment_count = request.installment_count.unwrap_or(0);

        let schedule = if !request.payment_method.is_immediate() {
            let first_due = match request.first_due_date {
                Some(date) => date,
                None => add_months(sale_date, self.config.sales.first_due_offset_months)?,
            };
            generate_schedule(&sale_id, total, down, installment_count, first_due)?
        } else {
            if let Some(received) = request.actual_amount_received {
                validate_amount_received(received, total)?;
            }
            Vec::new()
        };

        let sale = Sale {
            id: sale_id.clone(),
            tenant_id: tenant_id.to_string(),
            customer_id: request.customer_id.trim().to_string(),
            created_by: actor.user_id.clone(),
            total_cents: total.cents(),
            payment_method: request.payment_method,
            installment_count: i64::from(installment_count),
            down_payment_cents: down.cents(),
            actual_amount_received_cents: request.actual_amount_received.map(|m| m.cents()),
            status: SaleStatus::Completed,
            created_at: now,
            updated_at: now,
        };

        let items: Vec<SaleItem> = priced
            .iter()
            .map(|(snapshot, qty)| SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: snapshot.product_id.clone(),
                product_name: snapshot.name.clone(),
                unit_price_cents: snapshot.unit_price.cents(),
                unit_cost_cents: snapshot.unit_cost.cents(),
                quantity: *qty,
                line_total_cents: snapshot.unit_price.multiply_quantity(*qty).cents(),
                created_at: now,
            })
            .collect();

        let installments: Vec<Installment> = schedule
            .iter()
            .map(|scheduled| new_installment(tenant_id, scheduled, now))
            .collect();

        let cash_entry = self.sale_cash_entry(actor, &sale, sale_date);

        let event = SaleCommitted {
            tenant_id: tenant_id.to_string(),
            sale_id: sale_id.clone(),
            customer_id: sale.customer_id.clone(),
            total,
            payment_method: sale.payment_method,
            installment_count,
            lines: priced
                .iter()
                .map(|(snapshot, qty)| CommittedLine {
                    product_id: snapshot.product_id.clone(),
                    product_name: snapshot.name.clone(),
                    quantity: *qty,
                })
                .collect(),
            committed_by: actor.user_id.clone(),
            committed_at: now,
        };

        let mut tx = self.db.begin().await?;
        let result = self
            .write_sale(&mut tx, &sale, &items, &installments, cash_entry.as_ref(), &event)
            .await;
        finish_tx(tx, result, "commit_sale").await?;

        info!(
            sale_id = %sale.id,
            total = %total,
            method = %sale.payment_method,
            installments = installments.len(),
            "Sale committed"
        );

        Ok(CommittedSale {
            sale,
            items,
            installments,
            cash_entry,
        })
    }

    /// Cancels a sale and every installment of it that is still open.
    ///
    /// Cash already received stays in the ledger; refunds are recorded
    /// separately with [`Ledger::record_entry`].
    pub async fn cancel_sale(&self, actor: &Actor, sale_id: &str) -> LedgerResult<CancelledSale> {
        ensure_authenticated(actor)?;
        let tenant_id = actor.tenant_id.as_str();

        let sale = self
            .db
            .sales()
            .get_by_id(tenant_id, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(LedgerError::not_allowed(
                "sale",
                format!("sale {} is already cancelled", sale_id),
            ));
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let result = write_cancellation(&mut tx, actor, sale_id, now).await;
        let cancelled_installments = finish_tx(tx, result, "cancel_sale").await?;

        info!(sale_id = %sale_id, cancelled_installments, "Sale cancelled");

        let sale = self
            .db
            .sales()
            .get_by_id(tenant_id, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;

        Ok(CancelledSale {
            sale,
            cancelled_installments,
        })
    }

    /// Loads a sale with its items and schedule.
    pub async fn get_sale(&self, actor: &Actor, sale_id: &str) -> LedgerResult<SaleDetails> {
        ensure_authenticated(actor)?;
        let tenant_id = actor.tenant_id.as_str();

        let sale = self
            .db
            .sales()
            .get_by_id(tenant_id, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;
        let items = self.db.sales().get_items(&sale.id).await?;
        let installments = self.db.installments().list_by_sale(tenant_id, &sale.id).await?;

        Ok(SaleDetails {
            sale,
            items,
            installments,
        })
    }

    /// A customer's sales, newest first.
    pub async fn customer_sales(&self, actor: &Actor, customer_id: &str) -> LedgerResult<Vec<Sale>> {
        ensure_authenticated(actor)?;
        Ok(self
            .db
            .sales()
            .list_by_customer(&actor.tenant_id, customer_id)
            .await?)
    }

    /// Purchase count and lifetime spend, `None` before the first purchase.
    pub async fn customer_aggregate(
        &self,
        actor: &Actor,
        customer_id: &str,
    ) -> LedgerResult<Option<CustomerAggregate>> {
        ensure_authenticated(actor)?;
        Ok(self.db.customers().get(&actor.tenant_id, customer_id).await?)
    }

    /// Reads a snapshot for every line and collects every shortfall.
    async fn price_lines(
        &self,
        tenant_id: &str,
        lines: Vec<(String, i64)>,
    ) -> LedgerResult<Vec<(ProductSnapshot, i64)>> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut shortfalls = Vec::new();

        for (product_id, quantity) in lines {
            let snapshot = self
                .stock
                .snapshot(tenant_id, &product_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Product", &product_id))?;

            if quantity > snapshot.available {
                shortfalls.push(StockShortfall {
                    product_id: snapshot.product_id.clone(),
                    product_name: snapshot.name.clone(),
                    requested: quantity,
                    available: snapshot.available,
                });
            }
            priced.push((snapshot, quantity));
        }

        if !shortfalls.is_empty() {
            debug!(lines = shortfalls.len(), "Sale rejected for insufficient stock");
            return Err(LedgerError::InsufficientStock { shortfalls });
        }

        Ok(priced)
    }

    /// The realised-cash entry for a sale, if it produces one.
    fn sale_cash_entry(&self, actor: &Actor, sale: &Sale, date: NaiveDate) -> Option<CashFlowEntry> {
        let (category, amount, description) = match sale.payment_method {
            PaymentMethod::Installment if sale.down_payment().is_positive() => (
                EntryCategory::SaleDownPayment,
                sale.down_payment(),
                format!("Down payment for sale {}", sale.id),
            ),
            PaymentMethod::Installment => return None,
            PaymentMethod::Cash | PaymentMethod::Pix if self.config.sales.record_cash_sales => (
                EntryCategory::SaleCash,
                sale.actual_amount_received().unwrap_or_else(|| sale.total()),
                format!("{} sale {}", sale.payment_method, sale.id),
            ),
            PaymentMethod::Cash | PaymentMethod::Pix => return None,
        };

        Some(CashFlowEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: sale.tenant_id.clone(),
            entry_type: EntryType::Income,
            category,
            amount_cents: amount.cents(),
            transaction_date: date,
            reference_type: Some(ReferenceType::Sale),
            reference_id: Some(sale.id.clone()),
            description,
            created_by: actor.user_id.clone(),
            created_at: sale.created_at,
        })
    }

    async fn write_sale(
        &self,
        conn: &mut SqliteConnection,
        sale: &Sale,
        items: &[SaleItem],
        installments: &[Installment],
        cash_entry: Option<&CashFlowEntry>,
        event: &SaleCommitted,
    ) -> LedgerResult<()> {
        SaleRepository::insert_with_tx(conn, sale).await?;

        for item in items {
            SaleRepository::insert_item_with_tx(conn, item).await?;
        }

        for installment in installments {
            InstallmentRepository::insert_with_tx(conn, installment).await?;
        }

        if let Some(entry) = cash_entry {
            CashFlowRepository::insert_with_tx(conn, entry).await?;
        }

        for handler in &self.handlers {
            debug!(handler = handler.name(), sale_id = %sale.id, "Running sale handler");
            handler.on_sale_committed(conn, event).await?;
        }

        let event = DomainEvent::SaleCommitted(event.clone());
        OutboxRepository::append_with_tx(
            conn,
            &sale.tenant_id,
            event.event_type(),
            &sale.id,
            &event,
            sale.created_at,
        )
        .await?;

        Ok(())
    }
}

async fn write_cancellation(
    conn: &mut SqliteConnection,
    actor: &Actor,
    sale_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<u64> {
    SaleRepository::update_status_with_tx(conn, &actor.tenant_id, sale_id, SaleStatus::Cancelled, now)
        .await
        .map_err(|e| match e {
            // Lost a race with another cancel
            DbError::Conflict { .. } => LedgerError::not_allowed(
                "sale",
                format!("sale {} is already cancelled", sale_id),
            ),
            other => other.into(),
        })?;
    let cancelled =
        InstallmentRepository::cancel_open_for_sale_with_tx(conn, &actor.tenant_id, sale_id, now)
            .await?;

    let event = DomainEvent::SaleCancelled(SaleCancelled {
        tenant_id: actor.tenant_id.clone(),
        sale_id: sale_id.to_string(),
        cancelled_installments: cancelled,
        cancelled_by: actor.user_id.clone(),
        cancelled_at: now,
    });
    OutboxRepository::append_with_tx(conn, &actor.tenant_id, event.event_type(), sale_id, &event, now)
        .await?;

    Ok(cancelled)
}

fn new_installment(tenant_id: &str, scheduled: &ScheduledInstallment, now: DateTime<Utc>) -> Installment {
    Installment {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        sale_id: scheduled.sale_id.clone(),
        installment_number: i64::from(scheduled.installment_number),
        amount_cents: scheduled.amount.cents(),
        due_date: scheduled.due_date,
        status: InstallmentStatus::Pending,
        paid_amount_cents: 0,
        paid_at: None,
        payment_method: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Request Validation
// =============================================================================

/// Checks the request shape and merges lines for the same product.
///
/// Returns `(product_id, quantity)` pairs in first-seen order.
fn validate_request(
    request: &CommitSaleRequest,
    max_installments: u32,
) -> LedgerResult<Vec<(String, i64)>> {
    validate_customer_id(&request.customer_id)?;
    validate_line_count(request.lines.len())?;

    let mut merged: Vec<(String, i64)> = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let product_id = line.product_id.trim();
        if product_id.is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }
        validate_quantity(line.quantity)?;

        match merged.iter_mut().find(|entry| entry.0 == product_id) {
            Some(entry) => entry.1 += line.quantity,
            None => merged.push((product_id.to_string(), line.quantity)),
        }
    }

    // Merged lines must still respect the per-line cap
    for (_, quantity) in &merged {
        validate_quantity(*quantity)?;
    }

    match request.payment_method {
        PaymentMethod::Installment => {
            let count = request.installment_count.ok_or_else(|| ValidationError::Required {
                field: "installment_count".to_string(),
            })?;
            validate_installment_count(count, max_installments)?;

            if request.actual_amount_received.is_some() {
                return Err(LedgerError::not_allowed(
                    "actual_amount_received",
                    "only cash and pix sales record an amount received",
                ));
            }
        }
        PaymentMethod::Cash | PaymentMethod::Pix => {
            let credit_only = [
                ("installment_count", request.installment_count.is_some()),
                ("down_payment", request.down_payment.is_some()),
                ("first_due_date", request.first_due_date.is_some()),
            ];
            if let Some((field, _)) = credit_only.iter().find(|(_, present)| *present) {
                return Err(LedgerError::not_allowed(
                    field,
                    "only installment sales take schedule fields",
                ));
            }
        }
    }

    Ok(merged)
}
