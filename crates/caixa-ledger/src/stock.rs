//! # Stock Oracle
//!
//! Where the sale commit engine reads product price and availability.
//!
//! ```text
//! commit_sale ──► StockOracle::snapshot ──► ProductSnapshot (not locked)
//!                                                │
//!                   one transaction  ◄───────────┘
//!                   └── StockDecrementHandler (guarded UPDATE, the real check)
//! ```
//!
//! The snapshot is advisory: it lets the engine report every shortfall up
//! front. The guarded decrement inside the commit transaction is what
//! actually prevents overselling.

use async_trait::async_trait;
use serde::Serialize;

use caixa_core::Money;
use caixa_db::ProductRepository;

use crate::error::LedgerResult;

/// Price and availability of a product at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub available: i64,
}

#[async_trait]
pub trait StockOracle: Send + Sync {
    /// Returns `None` for unknown, inactive, or other-tenant products.
    async fn snapshot(&self, tenant_id: &str, product_id: &str) -> LedgerResult<Option<ProductSnapshot>>;
}

/// Reads the `products` table.
#[derive(Debug, Clone)]
pub struct SqliteStockOracle {
    products: ProductRepository,
}

impl SqliteStockOracle {
    pub fn new(products: ProductRepository) -> Self {
        SqliteStockOracle { products }
    }
}

#[async_trait]
impl StockOracle for SqliteStockOracle {
    async fn snapshot(&self, tenant_id: &str, product_id: &str) -> LedgerResult<Option<ProductSnapshot>> {
        let product = self.products.get_by_id(tenant_id, product_id).await?;

        Ok(product.map(|p| ProductSnapshot {
            unit_price: p.price(),
            unit_cost: p.cost(),
            available: p.stock_quantity,
            product_id: p.id,
            name: p.name,
        }))
    }
}
