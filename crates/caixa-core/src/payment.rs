//! # Installment Payment Transition
//!
//! The pure state change behind "receive a payment for installment N".
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──(part)──► Partial ──(part)──► Partial ──(rest)──► Paid      │
//! │      │                                                    ▲            │
//! │      └──────────────────(full amount)─────────────────────┘            │
//! │                                                                         │
//! │   Overdue ──(part)──► Partial            Overdue ──(rest)──► Paid       │
//! │                                                                         │
//! │   Cancelled ──► rejected          amount > remaining ──► Overpayment    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence (versioned update, payment row, ledger entry) is done by
//! caixa-ledger. This module only decides what the next state is.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Installment, InstallmentStatus, PaymentMethod};
use crate::validation::validate_payment_amount;

/// Computes the installment state after receiving `amount`.
///
/// The returned installment has `version` bumped by one and `updated_at`
/// set to `now`. The input is left untouched, so a rejected payment can
/// never leave a half-applied state behind.
///
/// ## Example
/// ```rust
/// use caixa_core::money::Money;
/// use caixa_core::payment::apply_payment;
/// use caixa_core::types::{Installment, InstallmentStatus, PaymentMethod};
/// use chrono::{NaiveDate, Utc};
///
/// let now = Utc::now();
/// let inst = Installment {
///     id: "i-1".into(), tenant_id: "t".into(), sale_id: "s".into(),
///     installment_number: 1, amount_cents: 30_000,
///     due_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
///     status: InstallmentStatus::Pending, paid_amount_cents: 0,
///     paid_at: None, payment_method: None, version: 0,
///     created_at: now, updated_at: now,
/// };
///
/// let half = apply_payment(&inst, Money::from_cents(15_000), PaymentMethod::Pix, now).unwrap();
/// assert_eq!(half.status, InstallmentStatus::Partial);
///
/// let done = apply_payment(&half, Money::from_cents(15_000), PaymentMethod::Cash, now).unwrap();
/// assert_eq!(done.status, InstallmentStatus::Paid);
/// assert!(done.paid_at.is_some());
/// assert_eq!(done.payment_method, Some(PaymentMethod::Pix));
/// ```
pub fn apply_payment(
    installment: &Installment,
    amount: Money,
    method: PaymentMethod,
    now: DateTime<Utc>,
) -> CoreResult<Installment> {
    validate_payment_amount(amount)?;

    if method == PaymentMethod::Installment {
        return Err(ValidationError::NotAllowed {
            field: "method".to_string(),
            reason: "an installment must be paid with pix or cash".to_string(),
        }
        .into());
    }

    if installment.status == InstallmentStatus::Cancelled {
        return Err(CoreError::InstallmentNotPayable {
            installment_id: installment.id.clone(),
            status: installment.status,
        });
    }

    let remaining = installment.remaining();
    if amount > remaining {
        return Err(CoreError::Overpayment {
            requested: amount,
            remaining,
        });
    }

    let new_paid = installment.paid_amount() + amount;
    let mut next = installment.clone();
    next.paid_amount_cents = new_paid.cents();
    next.payment_method = installment.payment_method.or(Some(method));
    next.version = installment.version + 1;
    next.updated_at = now;

    if new_paid == installment.amount() {
        next.status = InstallmentStatus::Paid;
        next.paid_at = Some(now);
    } else {
        // A later sweep moves it back to overdue while still past due
        next.status = InstallmentStatus::Partial;
    }

    Ok(next)
}

// =============================================================================
// Unit Tests
// =============================================================================
