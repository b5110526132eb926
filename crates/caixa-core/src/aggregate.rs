//! # Cash-Flow Aggregation
//!
//! Read models over the ledger (realised cash) and the installment
//! subledger (unrealised receivables).
//!
//! ## Two Sources, One Dashboard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   cash_flow_entries (income)          installments (open)               │
//! │   ─────────────────────────           ───────────────────               │
//! │   today ◄── date == today             remaining = amount − paid         │
//! │   this_week ◄── Monday..today           │                               │
//! │   this_month ◄── 1st..today             ├── due < today or overdue      │
//! │                                         │      → overdue_receivables    │
//! │                                         └── otherwise                   │
//! │                                                → pending_receivables    │
//! │                                                                         │
//! │   forecast: pending/partial due in [today, today+N months]             │
//! │             bucketed by "YYYY-MM", ascending                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here takes rows already fetched by the caller and the
//! reference date explicitly.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::money::Money;
use crate::schedule::add_months;
use crate::types::{CashFlowEntry, EntryType, Installment, InstallmentStatus};
use crate::validation::ValidationResult;

// =============================================================================
// Output Types
// =============================================================================

/// Income, expense and balance over a date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashFlowSummary {
    pub income: Money,
    pub expense: Money,
    /// income − expense
    pub balance: Money,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardMetrics {
    pub today: Money,
    pub this_week: Money,
    pub this_month: Money,
    pub pending_receivables: Money,
    pub overdue_receivables: Money,
}

/// Outstanding installment balances split by lateness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receivables {
    pub pending: Money,
    pub overdue: Money,
}

/// Expected receipts for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ForecastBucket {
    /// "YYYY-MM"
    pub month: String,
    pub expected: Money,
    pub count: u32,
}

// =============================================================================
// Windows
// =============================================================================

/// Monday of the ISO week containing `today`.
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_monday() as i64)
}

/// First day of the month containing `today`.
pub fn month_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

/// Earliest date [`metrics`] needs ledger rows from.
pub fn metrics_window_start(today: NaiveDate) -> NaiveDate {
    week_start(today).min(month_start(today))
}

/// "YYYY-MM" key for a date.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

// =============================================================================
// Aggregations
// =============================================================================

/// Sums entries whose `transaction_date` falls in `[start, end]`.
///
/// ## Example
/// ```rust
/// use caixa_core::aggregate::summarize;
/// use chrono::NaiveDate;
///
/// let d = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
/// let summary = summarize(&[], d, d);
/// assert!(summary.balance.is_zero());
/// ```
pub fn summarize(entries: &[CashFlowEntry], start: NaiveDate, end: NaiveDate) -> CashFlowSummary {
    let mut summary = CashFlowSummary::default();

    for entry in entries
        .iter()
        .filter(|e| e.transaction_date >= start && e.transaction_date <= end)
    {
        match entry.entry_type {
            EntryType::Income => summary.income += entry.amount(),
            EntryType::Expense => summary.expense += entry.amount(),
        }
    }

    summary.balance = summary.income - summary.expense;
    summary
}

/// Income only, over `[start, end]`.
pub fn income_between(entries: &[CashFlowEntry], start: NaiveDate, end: NaiveDate) -> Money {
    summarize(entries, start, end).income
}

/// Splits open installment balances into pending and overdue.
pub fn receivables(installments: &[Installment], today: NaiveDate) -> Receivables {
    let mut out = Receivables::default();

    for inst in installments.iter().filter(|i| i.status.is_open()) {
        if inst.is_past_due(today) {
            out.overdue += inst.remaining();
        } else {
            out.pending += inst.remaining();
        }
    }

    out
}

/// Builds dashboard metrics from ledger entries and installments.
///
/// `entries` must cover at least `[metrics_window_start(today), today]`.
pub fn metrics(
    entries: &[CashFlowEntry],
    installments: &[Installment],
    today: NaiveDate,
) -> DashboardMetrics {
    let open = receivables(installments, today);

    DashboardMetrics {
        today: income_between(entries, today, today),
        this_week: income_between(entries, week_start(today), today),
        this_month: income_between(entries, month_start(today), today),
        pending_receivables: open.pending,
        overdue_receivables: open.overdue,
    }
}

/// Expected receipts per month for the next `months` calendar months.
///
/// Only pending and partial installments due in `[today, today + months]`
/// are counted. Overdue ones belong to receivables, not to the forecast.
pub fn forecast(
    installments: &[Installment],
    today: NaiveDate,
    months: u32,
) -> ValidationResult<Vec<ForecastBucket>> {
    let horizon = add_months(today, months)?;
    let mut buckets: BTreeMap<String, ForecastBucket> = BTreeMap::new();

    for inst in installments.iter().filter(|i| {
        matches!(i.status, InstallmentStatus::Pending | InstallmentStatus::Partial)
            && i.due_date >= today
            && i.due_date <= horizon
    }) {
        let key = month_key(inst.due_date);
        let bucket = buckets.entry(key.clone()).or_insert_with(|| ForecastBucket {
            month: key,
            expected: Money::zero(),
            count: 0,
        });
        bucket.expected += inst.remaining();
        bucket.count += 1;
    }

    Ok(buckets.into_values().collect())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryCategory, ReferenceType};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(entry_type: EntryType, cents: i64, on: NaiveDate) -> CashFlowEntry {
        CashFlowEntry {
            id: format!("e-{cents}-{on}"),
            tenant_id: "t".to_string(),
            entry_type,
            category: match entry_type {
                EntryType::Income => EntryCategory::InstallmentPayment,
                EntryType::Expense => EntryCategory::Other,
            },
            amount_cents: cents,
            transaction_date: on,
            reference_type: Some(ReferenceType::Installment),
            reference_id: None,
            description: String::new(),
            created_by: "u".to_string(),
            created_at: Utc::now(),
        }
    }

    fn inst(status: InstallmentStatus, amount: i64, paid: i64, due: NaiveDate) -> Installment {
        let now = Utc::now();
        Installment {
            id: format!("i-{due}-{amount}"),
            tenant_id: "t".to_string(),
            sale_id: "s".to_string(),
            installment_number: 1,
            amount_cents: amount,
            due_date: due,
            status,
            paid_amount_cents: paid,
            paid_at: None,
            payment_method: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_windows() {
        // 2025-03-13 is a Thursday
        let today = date(2025, 3, 13);
        assert_eq!(week_start(today), date(2025, 3, 10));
        assert_eq!(month_start(today), date(2025, 3, 1));
        assert_eq!(week_start(date(2025, 3, 10)), date(2025, 3, 10));

        // Week crossing a month boundary
        let today = date(2025, 4, 2);
        assert_eq!(week_start(today), date(2025, 3, 31));
        assert_eq!(metrics_window_start(today), date(2025, 3, 31));
    }

    #[test]
    fn test_summary_inclusive_bounds() {
        let entries = vec![
            entry(EntryType::Income, 10_000, date(2025, 3, 1)),
            entry(EntryType::Income, 5_000, date(2025, 3, 31)),
            entry(EntryType::Expense, 2_500, date(2025, 3, 15)),
            entry(EntryType::Income, 99_999, date(2025, 4, 1)),
        ];

        let s = summarize(&entries, date(2025, 3, 1), date(2025, 3, 31));
        assert_eq!(s.income.cents(), 15_000);
        assert_eq!(s.expense.cents(), 2_500);
        assert_eq!(s.balance.cents(), 12_500);
    }

    #[test]
    fn test_metrics_income_windows() {
        let today = date(2025, 3, 13);
        let entries = vec![
            entry(EntryType::Income, 100, today),
            entry(EntryType::Income, 200, date(2025, 3, 10)),
            entry(EntryType::Income, 400, date(2025, 3, 2)),
            entry(EntryType::Expense, 800, today),
        ];

        let m = metrics(&entries, &[], today);
        assert_eq!(m.today.cents(), 100);
        assert_eq!(m.this_week.cents(), 300);
        assert_eq!(m.this_month.cents(), 700);
    }

    #[test]
    fn test_receivables_split() {
        let today = date(2025, 3, 13);
        let installments = vec![
            inst(InstallmentStatus::Pending, 10_000, 0, date(2025, 4, 1)),
            inst(InstallmentStatus::Partial, 10_000, 4_000, date(2025, 3, 1)),
            inst(InstallmentStatus::Overdue, 10_000, 0, date(2025, 2, 1)),
            inst(InstallmentStatus::Paid, 10_000, 10_000, date(2025, 1, 1)),
            inst(InstallmentStatus::Cancelled, 10_000, 0, date(2025, 1, 1)),
        ];

        let r = receivables(&installments, today);
        assert_eq!(r.pending.cents(), 10_000);
        // Partial past due before the sweep ran still counts as overdue
        assert_eq!(r.overdue.cents(), 16_000);
    }

    #[test]
    fn test_forecast_groups_by_month() {
        let today = date(2025, 3, 1);
        let installments = vec![
            inst(InstallmentStatus::Pending, 100_000, 0, date(2025, 3, 15)),
            inst(InstallmentStatus::Partial, 50_000, 20_000, date(2025, 3, 20)),
            inst(InstallmentStatus::Pending, 10_000, 0, date(2025, 5, 1)),
            inst(InstallmentStatus::Overdue, 77_700, 0, date(2025, 3, 5)),
            inst(InstallmentStatus::Pending, 5_000, 0, date(2025, 2, 28)),
            inst(InstallmentStatus::Pending, 5_000, 0, date(2025, 9, 1)),
        ];

        let buckets = forecast(&installments, today, 3).unwrap();
        assert_eq!(
            buckets,
            vec![
                ForecastBucket {
                    month: "2025-03".to_string(),
                    expected: Money::from_cents(130_000),
                    count: 2,
                },
                ForecastBucket {
                    month: "2025-05".to_string(),
                    expected: Money::from_cents(10_000),
                    count: 1,
                },
            ]
        );
    }

    #[test]
    fn test_forecast_horizon_inclusive() {
        let today = date(2025, 1, 31);
        let installments = vec![inst(InstallmentStatus::Pending, 1_000, 0, date(2025, 2, 28))];

        let buckets = forecast(&installments, today, 1).unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].month, "2025-02");
    }
}
