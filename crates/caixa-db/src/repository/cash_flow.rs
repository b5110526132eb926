//! # Cash-Flow Repository
//!
//! The append-only ledger of realised cash. Rows are inserted by the sale
//! engine, the payment applier and manual entries; the only removal path is
//! the administrative [`CashFlowRepository::delete`].

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use caixa_core::{CashFlowEntry, ReferenceType};

const ENTRY_COLUMNS: &str = "id, tenant_id, entry_type, category, amount_cents, transaction_date, \
                             reference_type, reference_id, description, created_by, created_at";

/// Repository for ledger entries.
#[derive(Debug, Clone)]
pub struct CashFlowRepository {
    pool: SqlitePool,
}

impl CashFlowRepository {
    /// Creates a new CashFlowRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashFlowRepository { pool }
    }

    /// Appends an entry inside an open transaction.
    pub async fn insert_with_tx(conn: &mut SqliteConnection, entry: &CashFlowEntry) -> DbResult<()> {
        debug!(
            id = %entry.id,
            category = ?entry.category,
            amount_cents = entry.amount_cents,
            "Recording cash-flow entry"
        );

        sqlx::query(
            r#"
            INSERT INTO cash_flow_entries (
                id, tenant_id, entry_type, category, amount_cents,
                transaction_date, reference_type, reference_id,
                description, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.tenant_id)
        .bind(entry.entry_type)
        .bind(entry.category)
        .bind(entry.amount_cents)
        .bind(entry.transaction_date)
        .bind(entry.reference_type)
        .bind(&entry.reference_id)
        .bind(&entry.description)
        .bind(&entry.created_by)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Appends a single entry in its own transaction.
    pub async fn insert(&self, entry: &CashFlowEntry) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with_tx(&mut conn, entry).await
    }

    /// Gets an entry of a tenant by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<CashFlowEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM cash_flow_entries WHERE tenant_id = ?1 AND id = ?2"
        );

        let entry = sqlx::query_as::<_, CashFlowEntry>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    /// Lists entries with `transaction_date` in `[start, end]`, oldest first.
    pub async fn list_between(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<CashFlowEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM cash_flow_entries \
             WHERE tenant_id = ?1 AND transaction_date >= ?2 AND transaction_date <= ?3 \
             ORDER BY transaction_date, created_at, rowid"
        );

        let entries = sqlx::query_as::<_, CashFlowEntry>(&sql)
            .bind(tenant_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Lists entries that point back at a given sale or installment.
    pub async fn list_by_reference(
        &self,
        tenant_id: &str,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> DbResult<Vec<CashFlowEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM cash_flow_entries \
             WHERE tenant_id = ?1 AND reference_type = ?2 AND reference_id = ?3 \
             ORDER BY created_at, rowid"
        );

        let entries = sqlx::query_as::<_, CashFlowEntry>(&sql)
            .bind(tenant_id)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Removes an entry. Administrative use only.
    pub async fn delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cash_flow_entries WHERE tenant_id = ?1 AND id = ?2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CashFlowEntry", id));
        }

        warn!(tenant_id = %tenant_id, id = %id, "Deleted cash-flow entry");
        Ok(())
    }

    /// Counts a tenant's entries.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cash_flow_entries WHERE tenant_id = ?1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
