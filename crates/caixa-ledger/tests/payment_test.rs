// Integration tests for the payment applier:
// 1. pending -> partial -> paid, with one ledger entry per payment
// 2. Overpayment and cancelled installments leave state untouched
// 3. Idempotency keys and optimistic versions

use caixa_core::{
    EntryCategory, InstallmentStatus, PaymentMethod, ReferenceType, DEFAULT_TENANT_ID,
};
use caixa_db::{DbError, InstallmentRepository};
use caixa_ledger::{
    CommitSaleRequest, CommittedSale, ErrorCategory, Ledger, LedgerError, PaymentRequest, SaleLine,
};

mod common;
use common::*;

/// A three-installment sale of 900.00, so each installment is 300.00.
async fn credit_sale(ledger: &Ledger) -> CommittedSale {
    add_product(ledger, "p-jacket", "Jaqueta Preto G", 90_000, 5).await;
    ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 3),
        )
        .await
        .unwrap()
}

fn pix(cents: i64, key: &str) -> PaymentRequest {
    PaymentRequest::new(money(cents), PaymentMethod::Pix, key)
}

#[tokio::test]
async fn test_two_halves_settle_installment() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];
    assert_eq!(target.amount_cents, 30_000);

    let first = ledger.apply_payment(&actor(), &target.id, pix(15_000, "half-1")).await.unwrap();
    assert_eq!(first.installment.status, InstallmentStatus::Partial);
    assert_eq!(first.installment.paid_amount_cents, 15_000);
    assert!(first.installment.paid_at.is_none());
    assert_eq!(first.installment.payment_method, Some(PaymentMethod::Pix));
    assert_eq!(first.cash_entry.category, EntryCategory::InstallmentPayment);
    assert_eq!(first.cash_entry.amount_cents, 15_000);

    let second = ledger
        .apply_payment(
            &actor(),
            &target.id,
            PaymentRequest::new(money(15_000), PaymentMethod::Cash, "half-2").with_notes("balcão"),
        )
        .await
        .unwrap();
    assert_eq!(second.installment.status, InstallmentStatus::Paid);
    assert_eq!(second.installment.paid_amount_cents, 30_000);
    assert!(second.installment.paid_at.is_some());
    // The first method used is kept
    assert_eq!(second.installment.payment_method, Some(PaymentMethod::Pix));

    let stored = ledger.get_installment(&actor(), &target.id).await.unwrap();
    assert_eq!(stored, second.installment);

    let entries = ledger
        .entries_for(&actor(), ReferenceType::Installment, &target.id)
        .await
        .unwrap();
    let amounts: Vec<i64> = entries.iter().map(|e| e.amount_cents).collect();
    assert_eq!(amounts, vec![15_000, 15_000]);

    let payments = ledger.list_payments(&actor(), &target.id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[1].notes.as_deref(), Some("balcão"));
    assert_eq!(payments[0].cash_flow_entry_id, first.cash_entry.id);

    // Other installments are untouched
    let other = ledger.get_installment(&actor(), &sale.installments[1].id).await.unwrap();
    assert_eq!(other.status, InstallmentStatus::Pending);
}

#[tokio::test]
async fn test_overpayment_is_rejected_without_side_effects() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];

    ledger.apply_payment(&actor(), &target.id, pix(15_000, "k-1")).await.unwrap();
    let before = ledger.get_installment(&actor(), &target.id).await.unwrap();

    let err = ledger.apply_payment(&actor(), &target.id, pix(15_100, "k-2")).await.unwrap_err();
    match err {
        LedgerError::Overpayment { requested, remaining } => {
            assert_eq!(requested, money(15_100));
            assert_eq!(remaining, money(15_000));
        }
        other => panic!("expected Overpayment, got {other:?}"),
    }

    let after = ledger.get_installment(&actor(), &target.id).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(ledger.list_payments(&actor(), &target.id).await.unwrap().len(), 1);

    // The rejected key was never consumed
    let retried = ledger.apply_payment(&actor(), &target.id, pix(15_000, "k-2")).await.unwrap();
    assert_eq!(retried.installment.status, InstallmentStatus::Paid);
}

#[tokio::test]
async fn test_paid_installment_rejects_further_payment() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[2];

    ledger.apply_payment(&actor(), &target.id, pix(30_000, "full")).await.unwrap();
    let err = ledger.apply_payment(&actor(), &target.id, pix(1, "extra")).await.unwrap_err();

    assert!(matches!(err, LedgerError::Overpayment { .. }));
}

#[tokio::test]
async fn test_reused_key_returns_original_payment() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];

    let applied = ledger.apply_payment(&actor(), &target.id, pix(10_000, "retry-me")).await.unwrap();

    let err = ledger.apply_payment(&actor(), &target.id, pix(10_000, "retry-me")).await.unwrap_err();
    match &err {
        LedgerError::DuplicatePayment { idempotency_key, payment_id } => {
            assert_eq!(idempotency_key, "retry-me");
            assert_eq!(payment_id, &applied.payment.id);
        }
        other => panic!("expected DuplicatePayment, got {other:?}"),
    }
    assert_eq!(err.code(), "DUPLICATE_PAYMENT");

    // Same key on another installment is still a duplicate
    let err = ledger
        .apply_payment(&actor(), &sale.installments[1].id, pix(10_000, "retry-me"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicatePayment { .. }));

    let stored = ledger.get_installment(&actor(), &target.id).await.unwrap();
    assert_eq!(stored.paid_amount_cents, 10_000);
    assert_eq!(ledger.database().cash_flow().count(DEFAULT_TENANT_ID).await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_payment_requests() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];

    let zero = ledger.apply_payment(&actor(), &target.id, pix(0, "z")).await.unwrap_err();
    assert!(matches!(zero, LedgerError::Validation(_)));

    let blank_key = ledger.apply_payment(&actor(), &target.id, pix(100, "  ")).await.unwrap_err();
    assert!(matches!(blank_key, LedgerError::Validation(_)));

    let credit = ledger
        .apply_payment(
            &actor(),
            &target.id,
            PaymentRequest::new(money(100), PaymentMethod::Installment, "c"),
        )
        .await
        .unwrap_err();
    assert!(matches!(credit, LedgerError::Validation(_)));

    let missing = ledger.apply_payment(&actor(), "no-such-id", pix(100, "m")).await.unwrap_err();
    assert_eq!(missing.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_installments_are_tenant_scoped() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;

    let outsider = caixa_core::Actor::new("user-9", "tenant-b");
    let err = ledger
        .apply_payment(&outsider, &sale.installments[0].id, pix(100, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_partial_payment_on_overdue_installment_is_re_swept() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];

    // First due date is 2025-03-01
    assert_eq!(ledger.sweep_overdue(&actor(), date(2025, 3, 5)).await.unwrap(), 1);

    let partial = ledger.apply_payment(&actor(), &target.id, pix(10_000, "late-1")).await.unwrap();
    assert_eq!(partial.installment.status, InstallmentStatus::Partial);

    // Still past due, so the next sweep flags it again
    assert_eq!(ledger.sweep_overdue(&actor(), date(2025, 3, 5)).await.unwrap(), 1);
    let swept = ledger.get_installment(&actor(), &target.id).await.unwrap();
    assert_eq!(swept.status, InstallmentStatus::Overdue);
    assert_eq!(swept.paid_amount_cents, 10_000);

    let settled = ledger.apply_payment(&actor(), &target.id, pix(20_000, "late-2")).await.unwrap();
    assert_eq!(settled.installment.status, InstallmentStatus::Paid);
}

#[tokio::test]
async fn test_stale_version_is_a_conflict() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let stale = sale.installments[0].clone();

    ledger.apply_payment(&actor(), &stale.id, pix(5_000, "first")).await.unwrap();

    let next = caixa_core::payment::apply_payment(
        &stale,
        money(5_000),
        PaymentMethod::Cash,
        chrono::Utc::now(),
    )
    .unwrap();

    let mut tx = ledger.database().begin().await.unwrap();
    let err = InstallmentRepository::update_payment_with_tx(&mut tx, &next, stale.version)
        .await
        .unwrap_err();
    tx.rollback().await.unwrap();

    assert!(matches!(err, DbError::Conflict { .. }));
    let mapped = LedgerError::from(err);
    assert!(mapped.is_retryable());
    assert!(matches!(mapped, LedgerError::Conflict { .. }));

    let stored = ledger.get_installment(&actor(), &stale.id).await.unwrap();
    assert_eq!(stored.paid_amount_cents, 5_000);
    assert_eq!(stored.version, stale.version + 1);
}

#[tokio::test]
async fn test_payment_appends_outbox_event() {
    let ledger = ledger_on(date(2025, 2, 1)).await;
    let sale = credit_sale(&ledger).await;
    let target = &sale.installments[0];

    ledger.apply_payment(&actor(), &target.id, pix(30_000, "evt")).await.unwrap();

    let events = ledger.database().outbox().list_for_aggregate(&target.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "installment_payment_applied");
    let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(payload["settled"], true);
}
