//! # Cash-Flow Ledger & Aggregator
//!
//! Read side of the ledger plus the manual-entry escape hatches.
//!
//! ## Entry Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        cash_flow_entries                                │
//! │                                                                         │
//! │  commit_sale ─────► sale_cash, sale_down_payment     (system managed)  │
//! │  apply_payment ───► installment_payment              (system managed)  │
//! │  record_entry ────► refund, adjustment, other        (manual)          │
//! │                                                                         │
//! │  summary ─────► Σ income / Σ expense / balance over [start, end]       │
//! │  metrics ─────► today / week / month income + open receivables         │
//! │  forecast ────► expected receipts per "YYYY-MM" bucket                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use caixa_core::aggregate::{
    self, metrics_window_start, CashFlowSummary, DashboardMetrics, ForecastBucket,
};
use caixa_core::schedule::add_months;
use caixa_core::validation::{validate_description, validate_payment_amount};
use caixa_core::{
    Actor, CashFlowEntry, EntryCategory, EntryType, Money, ReferenceType, ValidationError,
    MAX_INSTALLMENTS,
};

use crate::error::{LedgerError, LedgerResult};
use crate::{ensure_authenticated, Ledger};

/// A manual ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCashFlowEntry {
    pub entry_type: EntryType,
    /// Refund, adjustment or other. Sale categories are reserved.
    pub category: EntryCategory,
    pub amount: Money,
    /// Defaults to today.
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
}

impl Ledger {
    /// Income, expense and balance over `[start, end]`, both inclusive.
    pub async fn summary(
        &self,
        actor: &Actor,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<CashFlowSummary> {
        ensure_authenticated(actor)?;
        validate_range(start, end)?;

        let entries = self.db.cash_flow().list_between(&actor.tenant_id, start, end).await?;
        Ok(aggregate::summarize(&entries, start, end))
    }

    /// Dashboard numbers for the clock's current date.
    pub async fn metrics(&self, actor: &Actor) -> LedgerResult<DashboardMetrics> {
        self.metrics_on(actor, self.clock.today()).await
    }

    /// Dashboard numbers as of `today`.
    pub async fn metrics_on(&self, actor: &Actor, today: NaiveDate) -> LedgerResult<DashboardMetrics> {
        ensure_authenticated(actor)?;
        let tenant_id = actor.tenant_id.as_str();

        let entries = self
            .db
            .cash_flow()
            .list_between(tenant_id, metrics_window_start(today), today)
            .await?;
        let open = self.db.installments().list_open(tenant_id).await?;

        Ok(aggregate::metrics(&entries, &open, today))
    }

    /// Expected receipts for the next `months` calendar months.
    pub async fn forecast(&self, actor: &Actor, months: u32) -> LedgerResult<Vec<ForecastBucket>> {
        self.forecast_from(actor, self.clock.today(), months).await
    }

    /// Expected receipts for `months` calendar months starting at `today`.
    pub async fn forecast_from(
        &self,
        actor: &Actor,
        today: NaiveDate,
        months: u32,
    ) -> LedgerResult<Vec<ForecastBucket>> {
        ensure_authenticated(actor)?;
        if months == 0 || months > MAX_INSTALLMENTS {
            return Err(ValidationError::OutOfRange {
                field: "months".to_string(),
                min: 1,
                max: i64::from(MAX_INSTALLMENTS),
            }
            .into());
        }

        let horizon = add_months(today, months)?;
        let due = self
            .db
            .installments()
            .list_due_between(&actor.tenant_id, today, horizon)
            .await?;

        Ok(aggregate::forecast(&due, today, months)?)
    }

    /// Records a manual refund, adjustment or other entry.
    pub async fn record_entry(&self, actor: &Actor, new: NewCashFlowEntry) -> LedgerResult<CashFlowEntry> {
        ensure_authenticated(actor)?;

        if new.category.is_system_managed() {
            return Err(LedgerError::not_allowed(
                "category",
                "sale and installment entries are recorded by the ledger itself",
            ));
        }
        validate_payment_amount(new.amount)?;
        validate_description("description", &new.description)?;

        let entry = CashFlowEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: actor.tenant_id.clone(),
            entry_type: new.entry_type,
            category: new.category,
            amount_cents: new.amount.cents(),
            transaction_date: new.transaction_date.unwrap_or_else(|| self.clock.today()),
            reference_type: None,
            reference_id: None,
            description: new.description.trim().to_string(),
            created_by: actor.user_id.clone(),
            created_at: self.clock.now(),
        };

        self.db.cash_flow().insert(&entry).await?;

        info!(
            id = %entry.id,
            category = ?entry.category,
            amount = %new.amount,
            "Manual cash-flow entry recorded"
        );
        Ok(entry)
    }

    /// Entries dated within `[start, end]`.
    pub async fn list_entries(
        &self,
        actor: &Actor,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<CashFlowEntry>> {
        ensure_authenticated(actor)?;
        validate_range(start, end)?;
        Ok(self.db.cash_flow().list_between(&actor.tenant_id, start, end).await?)
    }

    /// Entries pointing at a sale or installment.
    pub async fn entries_for(
        &self,
        actor: &Actor,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> LedgerResult<Vec<CashFlowEntry>> {
        ensure_authenticated(actor)?;
        Ok(self
            .db
            .cash_flow()
            .list_by_reference(&actor.tenant_id, reference_type, reference_id)
            .await?)
    }

    /// Removes an entry. Administrative use only; the ledger is otherwise
    /// append-only.
    pub async fn delete_entry(&self, actor: &Actor, entry_id: &str) -> LedgerResult<()> {
        ensure_authenticated(actor)?;
        warn!(user_id = %actor.user_id, entry_id = %entry_id, "Administrative ledger delete requested");
        self.db.cash_flow().delete(&actor.tenant_id, entry_id).await?;
        Ok(())
    }
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> LedgerResult<()> {
    if end < start {
        return Err(ValidationError::InvalidFormat {
            field: "end".to_string(),
            reason: format!("{} is before start {}", end, start),
        }
        .into());
    }
    Ok(())
}
