//! # Installment Schedule Generator
//!
//! Splits the financed part of a credit sale into monthly installments.
//!
//! ## Amortization Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  financeable = total − down_payment                                     │
//! │  base        = round_half_up(financeable / count)     (to the cent)    │
//! │                                                                         │
//! │  #1 .. #(count−1)  → base                                              │
//! │  #count            → financeable − (count−1) × base   (absorbs rest)   │
//! │                                                                         │
//! │  Example: 1000.00 over 3                                                │
//! │    base = 333.33  →  333.33, 333.33, 333.34   Σ = 1000.00 exactly      │
//! │                                                                         │
//! │  Due dates: start + (i−1) months, each measured from start             │
//! │    start 2025-01-31 → 01-31, 02-28, 03-31, 04-30                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The generator is pure: no ids beyond the sale id, no clock, no storage.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_down_payment, validate_installment_count, ValidationResult};
use crate::MAX_INSTALLMENTS;

/// One row of a freshly generated schedule, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScheduledInstallment {
    pub sale_id: String,
    /// 1-based position in the schedule.
    pub installment_number: u32,
    pub amount: Money,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
}

/// Generates the installment schedule for a credit sale.
///
/// ## Errors
/// - `count` outside `1..=MAX_INSTALLMENTS`
/// - `down` negative or not below `total`
/// - financed amount too small to give every installment at least one cent
/// - a due date beyond chrono's supported range
///
/// ## Example
/// ```rust
/// use caixa_core::money::Money;
/// use caixa_core::schedule::generate_schedule;
/// use chrono::NaiveDate;
///
/// let start = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
/// let items = generate_schedule("s", Money::from_cents(90_000), Money::zero(), 3, start).unwrap();
///
/// assert!(items.iter().all(|i| i.amount.cents() == 30_000));
/// assert_eq!(items[1].due_date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
/// assert_eq!(items[2].due_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
/// ```
pub fn generate_schedule(
    sale_id: &str,
    total: Money,
    down: Money,
    count: u32,
    start_date: NaiveDate,
) -> ValidationResult<Vec<ScheduledInstallment>> {
    validate_installment_count(count, MAX_INSTALLMENTS)?;
    validate_down_payment(down, total)?;

    let financeable = total - down;
    let base = financeable.divide_rounded(count);
    let last = financeable - base * (count as i64 - 1);

    // Rounding up can leave nothing for the final installment (e.g. 0.06 over 4)
    if !base.is_positive() || !last.is_positive() {
        return Err(ValidationError::OutOfRange {
            field: "installment_count".to_string(),
            min: 1,
            max: max_count_for(financeable),
        });
    }

    (1..=count)
        .map(|number| {
            let amount = if number == count { last } else { base };
            Ok(ScheduledInstallment {
                sale_id: sale_id.to_string(),
                installment_number: number,
                amount,
                due_date: due_date_for(start_date, number)?,
            })
        })
        .collect()
}

/// Due date of installment `number` (1-based) for a schedule starting at `start`.
///
/// Shorter target months clamp to their last day.
pub fn due_date_for(start: NaiveDate, number: u32) -> ValidationResult<NaiveDate> {
    add_months(start, number.saturating_sub(1))
}

/// Adds calendar months, clamping to the end of shorter months.
pub fn add_months(date: NaiveDate, months: u32) -> ValidationResult<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "due_date".to_string(),
            reason: "date out of supported range".to_string(),
        })
}

/// Largest installment count that yields a valid schedule for `financeable`.
fn max_count_for(financeable: Money) -> i64 {
    (1..=MAX_INSTALLMENTS)
        .rev()
        .find(|&n| {
            let base = financeable.divide_rounded(n);
            let last = financeable - base * (n as i64 - 1);
            base.is_positive() && last.is_positive()
        })
        .map(i64::from)
        .unwrap_or(0)
}

// =============================================================================
// Unit Tests
// =============================================================================
