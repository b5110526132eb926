// Integration tests for the cash-flow ledger: summaries, forecast buckets
// and manual entries.

use caixa_core::{EntryCategory, EntryType, PaymentMethod};
use caixa_ledger::{CommitSaleRequest, LedgerError, NewCashFlowEntry, PaymentRequest, SaleLine};

mod common;
use common::*;

fn refund(cents: i64, description: &str) -> NewCashFlowEntry {
    NewCashFlowEntry {
        entry_type: EntryType::Expense,
        category: EntryCategory::Refund,
        amount: money(cents),
        transaction_date: None,
        description: description.to_string(),
    }
}

#[tokio::test]
async fn test_summary_balances_sales_payments_and_refunds() {
    let ledger = ledger_on(date(2025, 3, 3)).await;
    add_product(&ledger, "p-shirt", "Camiseta Preto M", 5_000, 20).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 100_000, 5).await;

    ledger
        .commit_sale(&actor(), CommitSaleRequest::pix(CUSTOMER, vec![SaleLine::new("p-shirt", 2)]))
        .await
        .unwrap();
    let credit = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 3)
                .with_down_payment(money(10_000)),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &credit.installments[0].id,
            PaymentRequest::new(money(30_000), PaymentMethod::Cash, "inst-1"),
        )
        .await
        .unwrap();
    ledger.record_entry(&actor(), refund(2_500, "Troca de tamanho")).await.unwrap();

    let summary = ledger.summary(&actor(), date(2025, 3, 1), date(2025, 3, 31)).await.unwrap();
    assert_eq!(summary.income, money(10_000 + 10_000 + 30_000));
    assert_eq!(summary.expense, money(2_500));
    assert_eq!(summary.balance, money(47_500));

    // Outside the range nothing counts
    let empty = ledger.summary(&actor(), date(2025, 2, 1), date(2025, 2, 28)).await.unwrap();
    assert_eq!(empty.balance, money(0));

    let listed = ledger.list_entries(&actor(), date(2025, 3, 3), date(2025, 3, 3)).await.unwrap();
    assert_eq!(listed.len(), 4);
}

#[tokio::test]
async fn test_summary_rejects_inverted_range() {
    let ledger = ledger_on(date(2025, 3, 3)).await;
    let err = ledger.summary(&actor(), date(2025, 3, 2), date(2025, 3, 1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_forecast_counts_only_remaining_balance() {
    let ledger = ledger_on(date(2025, 2, 10)).await;
    add_product(&ledger, "p-dress", "Vestido Verde P", 25_000, 3).await;

    let sale = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-dress", 1)], 1),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &sale.installments[0].id,
            PaymentRequest::new(money(5_000), PaymentMethod::Pix, "sinal"),
        )
        .await
        .unwrap();

    let buckets = ledger.forecast(&actor(), 6).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].month, "2025-03");
    assert_eq!(buckets[0].expected, money(20_000));
    assert_eq!(buckets[0].count, 1);
}

#[tokio::test]
async fn test_forecast_buckets_by_due_month_in_order() {
    let ledger = ledger_on(date(2025, 1, 20)).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 90_000, 5).await;
    add_product(&ledger, "p-coat", "Moletom Bege GG", 40_000, 5).await;

    // 300.00 due 2025-03-15, 2025-04-15, 2025-05-15
    ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 3)
                .with_first_due_date(date(2025, 3, 15)),
        )
        .await
        .unwrap();
    // 200.00 due 2025-03-31, 2025-04-30
    ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-coat", 1)], 2)
                .with_first_due_date(date(2025, 3, 31)),
        )
        .await
        .unwrap();

    let buckets = ledger.forecast_from(&actor(), date(2025, 1, 20), 3).await.unwrap();
    let months: Vec<&str> = buckets.iter().map(|b| b.month.as_str()).collect();
    // Horizon is 2025-04-20, so the April 30th and May installments fall outside
    assert_eq!(months, vec!["2025-03", "2025-04"]);
    assert_eq!(buckets[0].expected, money(50_000));
    assert_eq!(buckets[0].count, 2);
    assert_eq!(buckets[1].expected, money(30_000));
    assert_eq!(buckets[1].count, 1);
}

#[tokio::test]
async fn test_forecast_ignores_overdue_and_paid() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    add_product(&ledger, "p-jacket", "Jaqueta Preto G", 60_000, 5).await;

    let sale = ledger
        .commit_sale(
            &actor(),
            CommitSaleRequest::installments(CUSTOMER, vec![SaleLine::new("p-jacket", 1)], 2),
        )
        .await
        .unwrap();
    ledger
        .apply_payment(
            &actor(),
            &sale.installments[1].id,
            PaymentRequest::new(money(30_000), PaymentMethod::Pix, "early"),
        )
        .await
        .unwrap();
    ledger.sweep_overdue(&actor(), date(2025, 2, 20)).await.unwrap();

    let buckets = ledger.forecast_from(&actor(), date(2025, 2, 20), 6).await.unwrap();
    assert!(buckets.is_empty());
}

#[tokio::test]
async fn test_forecast_month_range() {
    let ledger = ledger_on(date(2025, 1, 10)).await;
    assert!(ledger.forecast(&actor(), 0).await.is_err());
    assert!(ledger.forecast(&actor(), 61).await.is_err());
    assert!(ledger.forecast(&actor(), 60).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_entry_rejects_system_categories() {
    let ledger = ledger_on(date(2025, 1, 10)).await;

    for category in [
        EntryCategory::SaleCash,
        EntryCategory::SaleDownPayment,
        EntryCategory::InstallmentPayment,
    ] {
        let entry = NewCashFlowEntry {
            entry_type: EntryType::Income,
            category,
            amount: money(1_000),
            transaction_date: None,
            description: String::new(),
        };
        let err = ledger.record_entry(&actor(), entry).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    assert!(ledger.record_entry(&actor(), refund(0, "zero")).await.is_err());
    assert!(ledger.record_entry(&actor(), refund(100, &"x".repeat(501))).await.is_err());
}

#[tokio::test]
async fn test_manual_entry_defaults_to_today_and_can_be_deleted() {
    let ledger = ledger_on(date(2025, 1, 10)).await;

    let adjustment = NewCashFlowEntry {
        entry_type: EntryType::Income,
        category: EntryCategory::Adjustment,
        amount: money(1_234),
        transaction_date: None,
        description: "  Acerto de caixa  ".to_string(),
    };
    let entry = ledger.record_entry(&actor(), adjustment).await.unwrap();
    assert_eq!(entry.transaction_date, date(2025, 1, 10));
    assert_eq!(entry.description, "Acerto de caixa");
    assert!(entry.reference_id.is_none());

    let backdated = NewCashFlowEntry {
        transaction_date: Some(date(2024, 12, 31)),
        ..refund(500, "Devolução")
    };
    let old = ledger.record_entry(&actor(), backdated).await.unwrap();
    let december = ledger.summary(&actor(), date(2024, 12, 1), date(2024, 12, 31)).await.unwrap();
    assert_eq!(december.balance, money(-500));

    ledger.delete_entry(&actor(), &old.id).await.unwrap();
    let december = ledger.summary(&actor(), date(2024, 12, 1), date(2024, 12, 31)).await.unwrap();
    assert_eq!(december.balance, money(0));

    let err = ledger.delete_entry(&actor(), &old.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}
