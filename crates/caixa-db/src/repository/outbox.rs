//! # Ledger Outbox Repository
//!
//! Durable queue of domain events written in the same transaction as the
//! state change they describe.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LEDGER OPERATION (e.g., commit_sale)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO sales / sale_items / installments / ...        │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO ledger_outbox (event_type, aggregate_id,       │   │
//! │  │     payload) VALUES ('sale_committed', ?, <event JSON>)        │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            dispatch_pending() (caixa-ledger, on demand)         │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM ledger_outbox WHERE dispatched_at IS NULL    │   │
//! │  │  2. For each entry: hand to subscriber                         │   │
//! │  │     a. Ok  → mark_dispatched()                                 │   │
//! │  │     b. Err → mark_failed(): attempts += 1, last_error = ?      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  An event is never announced for a change that rolled back, and a     │
//! │  committed change always has its event queued.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use caixa_core::LedgerOutboxEntry;

const OUTBOX_COLUMNS: &str = "id, tenant_id, event_type, aggregate_id, payload, attempts, \
                              last_error, created_at, dispatched_at";

/// Repository for ledger outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues an event inside the transaction that made the change.
    ///
    /// ## Arguments
    /// * `event_type` - Event name: "sale_committed", "installment_payment_applied", ...
    /// * `aggregate_id` - ID of the sale or installment concerned
    /// * `payload` - The event, serialized to JSON here
    pub async fn append_with_tx<T: Serialize>(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        event_type: &str,
        aggregate_id: &str,
        payload: &T,
        now: DateTime<Utc>,
    ) -> DbResult<LedgerOutboxEntry> {
        let entry = LedgerOutboxEntry {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            event_type: event_type.to_string(),
            aggregate_id: aggregate_id.to_string(),
            payload: serde_json::to_string(payload)?,
            attempts: 0,
            last_error: None,
            created_at: now,
            dispatched_at: None,
        };

        debug!(
            event_type = %event_type,
            aggregate_id = %aggregate_id,
            "Queuing outbox event"
        );

        sqlx::query(
            r#"
            INSERT INTO ledger_outbox (
                id, tenant_id, event_type, aggregate_id, payload,
                attempts, last_error, created_at, dispatched_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(&entry.event_type)
        .bind(&entry.aggregate_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.dispatched_at)
        .execute(&mut *conn)
        .await?;

        Ok(entry)
    }

    /// Gets undelivered entries with fewer than `max_attempts` failures,
    /// oldest first.
    ///
    /// Exhausted entries are left out so they cannot block newer ones.
    pub async fn get_pending(&self, limit: u32, max_attempts: i64) -> DbResult<Vec<LedgerOutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM ledger_outbox \
             WHERE dispatched_at IS NULL AND attempts < ?2 \
             ORDER BY created_at ASC, rowid ASC \
             LIMIT ?1"
        );

        let entries = sqlx::query_as::<_, LedgerOutboxEntry>(&sql)
            .bind(limit)
            .bind(max_attempts)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Counts undelivered entries that reached `max_attempts` failures.
    pub async fn count_exhausted(&self, max_attempts: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ledger_outbox WHERE dispatched_at IS NULL AND attempts >= ?1",
        )
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Lists entries about one aggregate (delivered or not), oldest first.
    pub async fn list_for_aggregate(&self, aggregate_id: &str) -> DbResult<Vec<LedgerOutboxEntry>> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM ledger_outbox \
             WHERE aggregate_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );

        let entries = sqlx::query_as::<_, LedgerOutboxEntry>(&sql)
            .bind(aggregate_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_dispatched(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query("UPDATE ledger_outbox SET dispatched_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LedgerOutboxEntry", id));
        }

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE ledger_outbox SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ledger_outbox WHERE dispatched_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes delivered entries older than `days_old` days.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_dispatched(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(days_old as i64);

        let result = sqlx::query(
            "DELETE FROM ledger_outbox WHERE dispatched_at IS NOT NULL AND dispatched_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
