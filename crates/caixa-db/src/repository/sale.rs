//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. COMMIT (one transaction, driven by caixa-ledger)                   │
//! │     └── insert_with_tx()       → Sale { status: Completed }            │
//! │     └── insert_item_with_tx()  → SaleItem (snapshot) × N               │
//! │     └── installments, cash entry, stock, outbox (other repositories)   │
//! │                                                                         │
//! │  2. READ                                                               │
//! │     └── get_by_id() / get_items()                                      │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     └── update_status_with_tx() → Sale { status: Cancelled }           │
//! │                                                                         │
//! │  Headers and items are never updated otherwise.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use caixa_core::{Sale, SaleItem, SaleStatus};

const SALE_COLUMNS: &str = "id, tenant_id, customer_id, created_by, total_cents, payment_method, \
                            installment_count, down_payment_cents, actual_amount_received_cents, \
                            status, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, unit_price_cents, \
                            unit_cost_cents, quantity, line_total_cents, created_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale of a tenant by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE tenant_id = ?1 AND id = ?2");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets the line items of a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, rowid"
        );

        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists a customer's sales, newest first.
    pub async fn list_by_customer(&self, tenant_id: &str, customer_id: &str) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND customer_id = ?2 \
             ORDER BY created_at DESC, rowid DESC"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Inserts a sale header inside an open transaction.
    pub async fn insert_with_tx(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, total_cents = sale.total_cents, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, customer_id, created_by, total_cents,
                payment_method, installment_count, down_payment_cents,
                actual_amount_received_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.customer_id)
        .bind(&sale.created_by)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.installment_count)
        .bind(sale.down_payment_cents)
        .bind(sale.actual_amount_received_cents)
        .bind(sale.status)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a sale item inside an open transaction.
    ///
    /// ## Snapshot Pattern
    /// Product name, price and cost are copied to the item so the sale
    /// history survives later catalog edits.
    pub async fn insert_item_with_tx(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, product_name, unit_price_cents,
                unit_cost_cents, quantity, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.unit_price_cents)
        .bind(item.unit_cost_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Changes a sale's status inside an open transaction.
    ///
    /// A sale already in `status` is not touched and yields `Conflict`, so
    /// only one of two racing transitions wins.
    pub async fn update_status_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        status: SaleStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating sale status");

        let result = sqlx::query(
            "UPDATE sales SET status = ?3, updated_at = ?4 \
             WHERE tenant_id = ?1 AND id = ?2 AND status != ?3",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = ?1 AND id = ?2")
                    .bind(tenant_id)
                    .bind(id)
                    .fetch_one(&mut *conn)
                    .await?;

            return Err(if exists > 0 {
                DbError::conflict("Sale", id)
            } else {
                DbError::not_found("Sale", id)
            });
        }

        Ok(())
    }

    /// Counts sales of a tenant.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts sale items belonging to a tenant's sales.
    pub async fn count_items(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sale_items si JOIN sales s ON s.id = si.sale_id \
             WHERE s.tenant_id = ?1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
