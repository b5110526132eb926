//! # Installment Repository
//!
//! Storage for the installment subledger.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Sale commit      insert_with_tx()              status = pending        │
//! │                                                                         │
//! │  Payment applier  update_payment_with_tx()      WHERE version = ?      │
//! │                   (0 rows → Conflict; caller reloads, retries)          │
//! │                                                                         │
//! │  Overdue sweep    mark_overdue()                one UPDATE, monotone    │
//! │                                                                         │
//! │  Sale cancel      cancel_open_for_sale_with_tx()                        │
//! │                                                                         │
//! │  Every write bumps `version` so a payment racing any of them loses.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use caixa_core::Installment;

const INSTALLMENT_COLUMNS: &str = "id, tenant_id, sale_id, installment_number, amount_cents, \
                                   due_date, status, paid_amount_cents, paid_at, payment_method, \
                                   version, created_at, updated_at";

/// Repository for installment operations.
#[derive(Debug, Clone)]
pub struct InstallmentRepository {
    pool: SqlitePool,
}

impl InstallmentRepository {
    /// Creates a new InstallmentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InstallmentRepository { pool }
    }

    /// Gets an installment of a tenant by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Installment>> {
        let sql = format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments WHERE tenant_id = ?1 AND id = ?2"
        );

        let installment = sqlx::query_as::<_, Installment>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(installment)
    }

    /// Lists a sale's installments ordered by number.
    pub async fn list_by_sale(&self, tenant_id: &str, sale_id: &str) -> DbResult<Vec<Installment>> {
        let sql = format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE tenant_id = ?1 AND sale_id = ?2 \
             ORDER BY installment_number"
        );

        let installments = sqlx::query_as::<_, Installment>(&sql)
            .bind(tenant_id)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(installments)
    }

    /// Lists every installment that still owes money (pending, partial, overdue).
    pub async fn list_open(&self, tenant_id: &str) -> DbResult<Vec<Installment>> {
        let sql = format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE tenant_id = ?1 AND status IN ('pending', 'partial', 'overdue') \
             ORDER BY due_date, installment_number"
        );

        let installments = sqlx::query_as::<_, Installment>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(installments)
    }

    /// Lists pending/partial installments due in `[start, end]`.
    pub async fn list_due_between(
        &self,
        tenant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> DbResult<Vec<Installment>> {
        let sql = format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM installments \
             WHERE tenant_id = ?1 AND status IN ('pending', 'partial') \
               AND due_date >= ?2 AND due_date <= ?3 \
             ORDER BY due_date, installment_number"
        );

        let installments = sqlx::query_as::<_, Installment>(&sql)
            .bind(tenant_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(installments)
    }

    /// Inserts an installment inside an open transaction.
    pub async fn insert_with_tx(conn: &mut SqliteConnection, inst: &Installment) -> DbResult<()> {
        debug!(
            sale_id = %inst.sale_id,
            number = inst.installment_number,
            amount_cents = inst.amount_cents,
            due_date = %inst.due_date,
            "Inserting installment"
        );

        sqlx::query(
            r#"
            INSERT INTO installments (
                id, tenant_id, sale_id, installment_number, amount_cents,
                due_date, status, paid_amount_cents, paid_at, payment_method,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&inst.id)
        .bind(&inst.tenant_id)
        .bind(&inst.sale_id)
        .bind(inst.installment_number)
        .bind(inst.amount_cents)
        .bind(inst.due_date)
        .bind(inst.status)
        .bind(inst.paid_amount_cents)
        .bind(inst.paid_at)
        .bind(inst.payment_method)
        .bind(inst.version)
        .bind(inst.created_at)
        .bind(inst.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Writes the payment-related fields of `next`, if the stored row is
    /// still at `expected_version`.
    ///
    /// ## Errors
    /// * `DbError::Conflict` - another writer got there first
    pub async fn update_payment_with_tx(
        conn: &mut SqliteConnection,
        next: &Installment,
        expected_version: i64,
    ) -> DbResult<()> {
        debug!(
            id = %next.id,
            expected_version,
            paid_amount_cents = next.paid_amount_cents,
            status = %next.status,
            "Updating installment payment state"
        );

        let result = sqlx::query(
            r#"
            UPDATE installments
            SET
                paid_amount_cents = ?3,
                status = ?4,
                paid_at = ?5,
                payment_method = ?6,
                version = ?7,
                updated_at = ?8
            WHERE tenant_id = ?1 AND id = ?2 AND version = ?9
            "#,
        )
        .bind(&next.tenant_id)
        .bind(&next.id)
        .bind(next.paid_amount_cents)
        .bind(next.status)
        .bind(next.paid_at)
        .bind(next.payment_method)
        .bind(next.version)
        .bind(next.updated_at)
        .bind(expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Installment", &next.id));
        }

        Ok(())
    }

    /// Cancels every still-open installment of a sale.
    ///
    /// Paid installments keep their status.
    pub async fn cancel_open_for_sale_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        sale_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'cancelled', version = version + 1, updated_at = ?3
            WHERE tenant_id = ?1 AND sale_id = ?2
              AND status IN ('pending', 'partial', 'overdue')
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(sale_id = %sale_id, cancelled = result.rows_affected(), "Cancelled open installments");
        Ok(result.rows_affected())
    }

    /// Flags pending/partial installments due before `today` as overdue.
    ///
    /// ## Returns
    /// The number of installments that changed. Running it again the same
    /// day returns 0.
    pub async fn mark_overdue(
        &self,
        tenant_id: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'overdue', version = version + 1, updated_at = ?3
            WHERE tenant_id = ?1
              AND status IN ('pending', 'partial')
              AND due_date < ?2
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(tenant_id = %tenant_id, today = %today, updated = result.rows_affected(), "Overdue sweep");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::sale::SaleRepository;
    use crate::{Database, DbConfig};
    use caixa_core::{InstallmentStatus, PaymentMethod, Sale, SaleStatus};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_sale(db: &Database, tenant: &str, dues: &[NaiveDate]) -> (String, Vec<Installment>) {
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant.to_string(),
            customer_id: "cust-1".to_string(),
            created_by: "user-1".to_string(),
            total_cents: 10_000 * dues.len() as i64,
            payment_method: PaymentMethod::Installment,
            installment_count: dues.len() as i64,
            down_payment_cents: 0,
            actual_amount_received_cents: None,
            status: SaleStatus::Completed,
            created_at: now,
            updated_at: now,
        };

        let installments: Vec<Installment> = dues
            .iter()
            .enumerate()
            .map(|(i, due)| Installment {
                id: Uuid::new_v4().to_string(),
                tenant_id: tenant.to_string(),
                sale_id: sale.id.clone(),
                installment_number: i as i64 + 1,
                amount_cents: 10_000,
                due_date: *due,
                status: InstallmentStatus::Pending,
                paid_amount_cents: 0,
                paid_at: None,
                payment_method: None,
                version: 0,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let mut tx = db.begin().await.unwrap();
        SaleRepository::insert_with_tx(&mut tx, &sale).await.unwrap();
        for inst in &installments {
            InstallmentRepository::insert_with_tx(&mut tx, inst).await.unwrap();
        }
        tx.commit().await.unwrap();

        (sale.id, installments)
    }

    #[tokio::test]
    async fn test_insert_and_list_by_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (sale_id, _) =
            seed_sale(&db, "t1", &[date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]).await;

        let list = db.installments().list_by_sale("t1", &sale_id).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[1].installment_number, 2);
        assert_eq!(list[1].due_date, date(2025, 2, 28));
        assert_eq!(list[1].status, InstallmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_versioned_update_detects_conflict() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, installments) = seed_sale(&db, "t1", &[date(2025, 3, 10)]).await;

        let mut next = installments[0].clone();
        next.paid_amount_cents = 5_000;
        next.status = InstallmentStatus::Partial;
        next.payment_method = Some(PaymentMethod::Cash);
        next.version = 1;

        let mut tx = db.begin().await.unwrap();
        InstallmentRepository::update_payment_with_tx(&mut tx, &next, 0).await.unwrap();
        // Same expected version again: stale
        let stale = InstallmentRepository::update_payment_with_tx(&mut tx, &next, 0).await;
        assert!(matches!(stale, Err(DbError::Conflict { .. })));
        tx.commit().await.unwrap();

        let loaded = db
            .installments()
            .get_by_id("t1", &next.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.paid_amount_cents, 5_000);
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.payment_method, Some(PaymentMethod::Cash));
    }

    #[tokio::test]
    async fn test_mark_overdue_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_sale(&db, "t1", &[date(2025, 3, 1), date(2025, 3, 10), date(2025, 4, 1)]).await;
        seed_sale(&db, "t2", &[date(2025, 1, 1)]).await;

        let today = date(2025, 3, 10);
        assert_eq!(db.installments().mark_overdue("t1", today, Utc::now()).await.unwrap(), 1);
        assert_eq!(db.installments().mark_overdue("t1", today, Utc::now()).await.unwrap(), 0);

        let open = db.installments().list_open("t1").await.unwrap();
        let overdue = open
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .count();
        assert_eq!(overdue, 1);

        // Other tenant untouched
        let other = db.installments().list_open("t2").await.unwrap();
        assert_eq!(other[0].status, InstallmentStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_open_for_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (sale_id, installments) =
            seed_sale(&db, "t1", &[date(2025, 3, 1), date(2025, 4, 1)]).await;

        let mut paid = installments[0].clone();
        paid.paid_amount_cents = 10_000;
        paid.status = InstallmentStatus::Paid;
        paid.paid_at = Some(Utc::now());
        paid.version = 1;

        let mut tx = db.begin().await.unwrap();
        InstallmentRepository::update_payment_with_tx(&mut tx, &paid, 0).await.unwrap();
        let cancelled =
            InstallmentRepository::cancel_open_for_sale_with_tx(&mut tx, "t1", &sale_id, Utc::now())
                .await
                .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(cancelled, 1);
        let list = db.installments().list_by_sale("t1", &sale_id).await.unwrap();
        assert_eq!(list[0].status, InstallmentStatus::Paid);
        assert_eq!(list[1].status, InstallmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_list_due_between() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_sale(&db, "t1", &[date(2025, 2, 1), date(2025, 3, 1), date(2025, 6, 2)]).await;

        let due = db
            .installments()
            .list_due_between("t1", date(2025, 3, 1), date(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].due_date, date(2025, 3, 1));
    }
}
