//! # Product Repository
//!
//! Read and decrement access to the products table. Catalog editing lives
//! outside the ledger; this is what the stock oracle and the stock
//! decrement handler need.
//!
//! ## Guarded Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Why the decrement carries a guard                      │
//! │                                                                         │
//! │  t0  Sale A reads snapshot: available = 3                               │
//! │  t0  Sale B reads snapshot: available = 3                               │
//! │  t1  Sale A commit tx:  UPDATE ... SET stock = stock - 3                │
//! │                         WHERE id = ? AND stock >= 3   → 1 row ✓        │
//! │  t2  Sale B commit tx:  UPDATE ... SET stock = stock - 2                │
//! │                         WHERE id = ? AND stock >= 2   → 0 rows ✗       │
//! │                         → InsufficientStock, whole sale rolls back      │
//! │                                                                         │
//! │  The snapshot is advisory. The guarded UPDATE is the real check.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use caixa_core::Product;

const PRODUCT_COLUMNS: &str = "id, tenant_id, name, price_cents, cost_cents, stock_quantity, \
                               is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets an active product of a tenant by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND id = ?2 AND is_active = 1"
        );

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts a product (seeding and tests).
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, name, price_cents, cost_cents,
                stock_quantity, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product.clone())
    }

    /// Decrements stock inside an open transaction, only if enough is left.
    ///
    /// ## Returns
    /// * `Ok(true)` - stock was decremented
    /// * `Ok(false)` - product missing or fewer than `quantity` units left
    pub async fn decrement_stock_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, quantity, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                stock_quantity = stock_quantity - ?3,
                updated_at = ?4
            WHERE tenant_id = ?1 AND id = ?2 AND stock_quantity >= ?3
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Current stock of a product, active or not.
    pub async fn stock_of(&self, tenant_id: &str, id: &str) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::stock_of_with_tx(&mut conn, tenant_id, id).await
    }

    /// Current stock as seen by an open transaction.
    pub async fn stock_of_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar(
            "SELECT stock_quantity FROM products WHERE tenant_id = ?1 AND id = ?2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(stock)
    }

    /// Counts active products of a tenant (for diagnostics).
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND is_active = 1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn product(tenant: &str, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            tenant_id: tenant.to_string(),
            name: "Camiseta Básica".to_string(),
            price_cents: 4_990,
            cost_cents: 2_100,
            stock_quantity: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_get_by_id_is_tenant_scoped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = db.products().insert(&product("t1", 5)).await.unwrap();

        assert!(db.products().get_by_id("t1", &p.id).await.unwrap().is_some());
        assert!(db.products().get_by_id("t2", &p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guarded_decrement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = db.products().insert(&product("t1", 3)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let ok = ProductRepository::decrement_stock_with_tx(&mut conn, "t1", &p.id, 2, Utc::now())
            .await
            .unwrap();
        assert!(ok);

        let ok = ProductRepository::decrement_stock_with_tx(&mut conn, "t1", &p.id, 2, Utc::now())
            .await
            .unwrap();
        assert!(!ok);
        drop(conn);

        assert_eq!(db.products().stock_of("t1", &p.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_count() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&product("t1", 1)).await.unwrap();
        db.products().insert(&product("t1", 1)).await.unwrap();
        db.products().insert(&product("t2", 1)).await.unwrap();

        assert_eq!(db.products().count("t1").await.unwrap(), 2);
    }
}
