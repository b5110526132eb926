//! # Overdue Sweep
//!
//! Flags installments that passed their due date unpaid. A single
//! tenant-scoped UPDATE, safe to run as often as a scheduler likes:
//!
//! ```text
//! pending ──┐
//!           ├── due_date < today ──► overdue
//! partial ──┘
//! ```
//!
//! Paid and cancelled installments are never touched and the sweep writes
//! nothing to the cash-flow ledger.

use chrono::NaiveDate;
use tracing::debug;

use caixa_core::Actor;

use crate::error::LedgerResult;
use crate::{ensure_authenticated, Ledger};

impl Ledger {
    /// Marks installments due before `today` as overdue.
    ///
    /// Returns how many changed. A second run for the same day returns 0.
    pub async fn sweep_overdue(&self, actor: &Actor, today: NaiveDate) -> LedgerResult<u64> {
        ensure_authenticated(actor)?;
        debug!(tenant_id = %actor.tenant_id, today = %today, user_id = %actor.user_id, "Sweeping overdue installments");

        let updated = self
            .db
            .installments()
            .mark_overdue(&actor.tenant_id, today, self.clock.now())
            .await?;

        Ok(updated)
    }

    /// [`Ledger::sweep_overdue`] for the clock's current date.
    pub async fn sweep_overdue_today(&self, actor: &Actor) -> LedgerResult<u64> {
        self.sweep_overdue(actor, self.clock.today()).await
    }
}
