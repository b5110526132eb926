//! # Installment Payment Repository
//!
//! One row per accepted payment. The `(tenant_id, idempotency_key)` unique
//! index is what turns a retried request into a reported duplicate instead
//! of a second charge.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use caixa_core::InstallmentPayment;

const PAYMENT_COLUMNS: &str = "id, tenant_id, installment_id, amount_cents, method, notes, \
                               idempotency_key, cash_flow_entry_id, created_by, created_at";

/// Repository for installment payments.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Looks up a payment by its idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> DbResult<Option<InstallmentPayment>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_idempotency_key_with_tx(&mut conn, tenant_id, key).await
    }

    /// Looks up a payment by its idempotency key inside an open transaction.
    pub async fn find_by_idempotency_key_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        key: &str,
    ) -> DbResult<Option<InstallmentPayment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM installment_payments \
             WHERE tenant_id = ?1 AND idempotency_key = ?2"
        );

        let payment = sqlx::query_as::<_, InstallmentPayment>(&sql)
            .bind(tenant_id)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(payment)
    }

    /// Lists the payments made to an installment, oldest first.
    pub async fn list_by_installment(
        &self,
        tenant_id: &str,
        installment_id: &str,
    ) -> DbResult<Vec<InstallmentPayment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM installment_payments \
             WHERE tenant_id = ?1 AND installment_id = ?2 \
             ORDER BY created_at, rowid"
        );

        let payments = sqlx::query_as::<_, InstallmentPayment>(&sql)
            .bind(tenant_id)
            .bind(installment_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    /// Inserts a payment inside an open transaction.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the idempotency key was already used
    pub async fn insert_with_tx(
        conn: &mut SqliteConnection,
        payment: &InstallmentPayment,
    ) -> DbResult<()> {
        debug!(
            id = %payment.id,
            installment_id = %payment.installment_id,
            amount_cents = payment.amount_cents,
            "Inserting installment payment"
        );

        sqlx::query(
            r#"
            INSERT INTO installment_payments (
                id, tenant_id, installment_id, amount_cents, method, notes,
                idempotency_key, cash_flow_entry_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.tenant_id)
        .bind(&payment.installment_id)
        .bind(payment.amount_cents)
        .bind(payment.method)
        .bind(&payment.notes)
        .bind(&payment.idempotency_key)
        .bind(&payment.cash_flow_entry_id)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
