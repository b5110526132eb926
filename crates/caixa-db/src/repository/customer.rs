//! # Customer Aggregate Repository
//!
//! Running purchase totals per customer, bumped inside the sale commit
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use caixa_core::CustomerAggregate;

/// Repository for customer aggregates.
#[derive(Debug, Clone)]
pub struct CustomerAggregateRepository {
    pool: SqlitePool,
}

impl CustomerAggregateRepository {
    /// Creates a new CustomerAggregateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerAggregateRepository { pool }
    }

    /// Gets the aggregate for a customer, if they ever bought anything.
    pub async fn get(&self, tenant_id: &str, customer_id: &str) -> DbResult<Option<CustomerAggregate>> {
        let aggregate = sqlx::query_as::<_, CustomerAggregate>(
            r#"
            SELECT tenant_id, customer_id, purchase_count, total_spent_cents, last_purchase_at
            FROM customer_aggregates
            WHERE tenant_id = ?1 AND customer_id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate)
    }

    /// Adds one purchase of `amount_cents` to a customer's totals.
    pub async fn record_purchase_with_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        customer_id: &str,
        amount_cents: i64,
        at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(customer_id = %customer_id, amount_cents, "Updating customer aggregate");

        sqlx::query(
            r#"
            INSERT INTO customer_aggregates (
                tenant_id, customer_id, purchase_count, total_spent_cents, last_purchase_at
            ) VALUES (?1, ?2, 1, ?3, ?4)
            ON CONFLICT (tenant_id, customer_id) DO UPDATE SET
                purchase_count = purchase_count + 1,
                total_spent_cents = total_spent_cents + excluded.total_spent_cents,
                last_purchase_at = excluded.last_purchase_at
            "#,
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(amount_cents)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
