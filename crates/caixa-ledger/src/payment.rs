//! # Installment Payment Applier
//!
//! ## Payment Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        apply_payment                                    │
//! │                                                                         │
//! │  key already used? ──── yes ──► DuplicatePayment { payment_id }        │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  load installment (tenant scoped) ── missing ──► NotFound              │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  caixa_core::payment::apply_payment                                    │
//! │    cancelled ──► Validation      amount > remaining ──► Overpayment    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  BEGIN                                                                 │
//! │    UPDATE installments ... WHERE version = ?   (0 rows ──► Conflict)   │
//! │    INSERT cash_flow_entries  (installment_payment, income)             │
//! │    INSERT installment_payments (unique tenant + key)                   │
//! │    INSERT ledger_outbox ("installment_payment_applied")                │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use caixa_core::validation::{validate_description, validate_idempotency_key, validate_payment_amount};
use caixa_core::{
    Actor, CashFlowEntry, EntryCategory, EntryType, Installment, InstallmentPayment,
    InstallmentStatus, Money, PaymentMethod, ReferenceType,
};
use caixa_db::{
    CashFlowRepository, DbError, InstallmentRepository, OutboxRepository, PaymentRepository,
};

use crate::error::{LedgerError, LedgerResult};
use crate::events::{DomainEvent, InstallmentPaymentApplied};
use crate::{ensure_authenticated, finish_tx, Ledger};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    /// Pix or cash.
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    /// Caller-chosen key; resending the same key never pays twice.
    pub idempotency_key: String,
}

impl PaymentRequest {
    pub fn new(amount: Money, method: PaymentMethod, idempotency_key: impl Into<String>) -> Self {
        PaymentRequest {
            amount,
            method,
            notes: None,
            idempotency_key: idempotency_key.into(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedPayment {
    /// The installment after the payment.
    pub installment: Installment,
    pub payment: InstallmentPayment,
    /// The `installment_payment` income entry for exactly this amount.
    pub cash_entry: CashFlowEntry,
}

impl Ledger {
    /// Applies a partial or full payment to an installment.
    ///
    /// ## Errors
    /// * `Validation` - non-positive amount, blank key, cancelled installment
    /// * `DuplicatePayment` - the key was already used in this tenant
    /// * `NotFound` - no such installment in the actor's tenant
    /// * `Overpayment` - amount above what is still owed
    /// * `Conflict` - the installment changed while this payment was applied
    pub async fn apply_payment(
        &self,
        actor: &Actor,
        installment_id: &str,
        request: PaymentRequest,
    ) -> LedgerResult<AppliedPayment> {
        ensure_authenticated(actor)?;
        validate_idempotency_key(&request.idempotency_key)?;
        validate_payment_amount(request.amount)?;
        if let Some(notes) = &request.notes {
            validate_description("notes", notes)?;
        }

        let tenant_id = actor.tenant_id.as_str();
        let key = request.idempotency_key.trim();

        if let Some(existing) = self.db.payments().find_by_idempotency_key(tenant_id, key).await? {
            return Err(duplicate(key, existing));
        }

        let current = self
            .db
            .installments()
            .get_by_id(tenant_id, installment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Installment", installment_id))?;

        let now = self.clock.now();
        let next = caixa_core::payment::apply_payment(&current, request.amount, request.method, now)?;

        let cash_entry = CashFlowEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            entry_type: EntryType::Income,
            category: EntryCategory::InstallmentPayment,
            amount_cents: request.amount.cents(),
            transaction_date: self.clock.today(),
            reference_type: Some(ReferenceType::Installment),
            reference_id: Some(current.id.clone()),
            description: format!(
                "Installment {} of sale {}",
                current.installment_number, current.sale_id
            ),
            created_by: actor.user_id.clone(),
            created_at: now,
        };

        let payment = InstallmentPayment {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            installment_id: current.id.clone(),
            amount_cents: request.amount.cents(),
            method: request.method,
            notes: request.notes.clone(),
            idempotency_key: key.to_string(),
            cash_flow_entry_id: cash_entry.id.clone(),
            created_by: actor.user_id.clone(),
            created_at: now,
        };

        let event = DomainEvent::InstallmentPaymentApplied(InstallmentPaymentApplied {
            tenant_id: tenant_id.to_string(),
            installment_id: current.id.clone(),
            sale_id: current.sale_id.clone(),
            payment_id: payment.id.clone(),
            amount: request.amount,
            remaining: next.remaining(),
            settled: next.status == InstallmentStatus::Paid,
            applied_by: actor.user_id.clone(),
            applied_at: now,
        });

        let mut tx = self.db.begin().await?;
        let result = write_payment(&mut tx, &next, current.version, &payment, &cash_entry, &event).await;

        match finish_tx(tx, result, "apply_payment").await {
            Ok(()) => {}
            Err(err @ LedgerError::Persistence(DbError::UniqueViolation { .. })) => {
                // A concurrent request with the same key committed first
                if let Some(existing) = self.db.payments().find_by_idempotency_key(tenant_id, key).await? {
                    return Err(duplicate(key, existing));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        info!(
            installment_id = %next.id,
            payment_id = %payment.id,
            amount = %request.amount,
            remaining = %next.remaining(),
            status = %next.status,
            "Installment payment applied"
        );

        Ok(AppliedPayment {
            installment: next,
            payment,
            cash_entry,
        })
    }

    /// Loads one installment of the actor's tenant.
    pub async fn get_installment(&self, actor: &Actor, installment_id: &str) -> LedgerResult<Installment> {
        ensure_authenticated(actor)?;
        self.db
            .installments()
            .get_by_id(&actor.tenant_id, installment_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Installment", installment_id))
    }

    /// Payments accepted for an installment, oldest first.
    pub async fn list_payments(
        &self,
        actor: &Actor,
        installment_id: &str,
    ) -> LedgerResult<Vec<InstallmentPayment>> {
        ensure_authenticated(actor)?;
        Ok(self
            .db
            .payments()
            .list_by_installment(&actor.tenant_id, installment_id)
            .await?)
    }
}

fn duplicate(key: &str, existing: InstallmentPayment) -> LedgerError {
    warn!(
        idempotency_key = %key,
        payment_id = %existing.id,
        "Rejected payment with reused idempotency key"
    );
    LedgerError::DuplicatePayment {
        idempotency_key: key.to_string(),
        payment_id: existing.id,
    }
}

async fn write_payment(
    conn: &mut SqliteConnection,
    next: &Installment,
    expected_version: i64,
    payment: &InstallmentPayment,
    cash_entry: &CashFlowEntry,
    event: &DomainEvent,
) -> LedgerResult<()> {
    InstallmentRepository::update_payment_with_tx(conn, next, expected_version).await?;
    CashFlowRepository::insert_with_tx(conn, cash_entry).await?;
    PaymentRepository::insert_with_tx(conn, payment).await?;
    OutboxRepository::append_with_tx(
        conn,
        &next.tenant_id,
        event.event_type(),
        &next.id,
        event,
        payment.created_at,
    )
    .await?;
    Ok(())
}
