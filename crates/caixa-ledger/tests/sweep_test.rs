// Integration tests for the overdue sweep and the receivables it feeds.

use caixa_core::{InstallmentStatus, PaymentMethod, DEFAULT_TENANT_ID};
use caixa_ledger::{CommitSaleRequest, LedgerError, PaymentRequest, SaleLine};

mod common;
use common::*;

#[tokio::test]
async fn test_sweep_marks_past_due_and_is_idempotent() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 90_000, 5).await;

    // Due 2025-02-10, 2025-03-10, 2025-04-10
    let sale = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 3),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &sale.installments[1].id,
            PaymentRequest::new(money(1_000), PaymentMethod::Cash, "partial-2"),
        )
        .await
        .unwrap();
    let entries_before = ledger.database().cash_flow().count(DEFAULT_TENANT_ID).await.unwrap();

    let marked = ledger.sweep_overdue(&actor(), date(2025, 3, 15)).await.unwrap();
    assert_eq!(marked, 2);
    assert_eq!(ledger.sweep_overdue(&actor(), date(2025, 3, 15)).await.unwrap(), 0);

    let details = ledger.get_sale(&actor(), &sale.sale.id).await.unwrap();
    let statuses: Vec<_> = details.installments.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![InstallmentStatus::Overdue, InstallmentStatus::Overdue, InstallmentStatus::Pending]
    );
    // Partial payments survive the status change
    assert_eq!(details.installments[1].paid_amount_cents, 1_000);

    let entries_after = ledger.database().cash_flow().count(DEFAULT_TENANT_ID).await.unwrap();
    assert_eq!(entries_after, entries_before);
}

#[tokio::test]
async fn test_installment_due_today_is_not_overdue() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-coat", "Moletom Bege GG", 40_000, 2).await;
    ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-coat", 1)], 1),
        )
        .await
        .unwrap();

    assert_eq!(ledger.sweep_overdue(&actor(), date(2025, 2, 10)).await.unwrap(), 0);
    assert_eq!(ledger.sweep_overdue(&actor(), date(2025, 2, 11)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sweep_skips_paid_cancelled_and_other_tenants() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 60_000, 5).await;

    let paid = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 1),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &paid.installments[0].id,
            PaymentRequest::new(money(60_000), PaymentMethod::Pix, "settle"),
        )
        .await
        .unwrap();

    let cancelled = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 2),
        )
        .await
        .unwrap();
    ledger.cancel_sale(&actor(), &cancelled.sale.id).await.unwrap();

    let elsewhere = caixa_core::Actor::new("user-2", "tenant-b");
    assert_eq!(ledger.sweep_overdue(&elsewhere, date(2026, 1, 1)).await.unwrap(), 0);
    assert_eq!(ledger.sweep_overdue(&actor(), date(2026, 1, 1)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_today_uses_clock() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-coat", "Moletom Bege GG", 40_000, 2).await;
    ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-coat", 1)], 2)
                .with_first_due_date(date(2025, 1, 9)),
        )
        .await
        .unwrap();

    assert_eq!(ledger.sweep_overdue_today(&actor()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_metrics_split_receivables_by_due_date() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 90_000, 5).await;
    let sale = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 3)
                .with_first_due_date(date(2025, 1, 5)),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &sale.installments[0].id,
            PaymentRequest::new(money(10_000), PaymentMethod::Pix, "p-1"),
        )
        .await
        .unwrap();

    let metrics = ledger.metrics(&actor()).await.unwrap();
    assert_eq!(metrics.overdue_receivables, money(20_000));
    assert_eq!(metrics.pending_receivables, money(60_000));
    assert_eq!(metrics.today, money(10_000));
    assert_eq!(metrics.this_month, money(10_000));
}

#[tokio::test]
async fn test_sweep_requires_actor() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    let nobody = caixa_core::Actor::new("  ", DEFAULT_TENANT_ID);
    let err = ledger.sweep_overdue(&nobody, date(2025, 1, 10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Authentication));
}
