// Shared setup for ledger integration tests: an in-memory database, a
// pinned clock and a few products in stock.

#![allow(dead_code)]

use caixa_core::{Actor, Money, Product, DEFAULT_TENANT_ID};
use caixa_db::{Database, DbConfig};
use caixa_ledger::{FixedClock, Ledger, LedgerConfig};
use chrono::{NaiveDate, Utc};

pub const CUSTOMER: &str = "cust-0001";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn actor() -> Actor {
    Actor::new("user-1", DEFAULT_TENANT_ID)
}

pub fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

pub async fn ledger_on(today: NaiveDate) -> Ledger {
    ledger_with_config(today, LedgerConfig::in_memory()).await
}

pub async fn ledger_with_config(today: NaiveDate, config: LedgerConfig) -> Ledger {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Ledger::new(db, config).with_clock(FixedClock::on(today))
}

pub async fn add_product(ledger: &Ledger, id: &str, name: &str, price_cents: i64, stock: i64) {
    add_product_for(ledger, DEFAULT_TENANT_ID, id, name, price_cents, stock).await;
}

pub async fn add_product_for(
    ledger: &Ledger,
    tenant_id: &str,
    id: &str,
    name: &str,
    price_cents: i64,
    stock: i64,
) {
    let now = Utc::now();
    ledger
        .database()
        .products()
        .insert(&Product {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            price_cents,
            cost_cents: price_cents / 2,
            stock_quantity: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

pub async fn stock_of(ledger: &Ledger, id: &str) -> i64 {
    ledger
        .database()
        .products()
        .stock_of(DEFAULT_TENANT_ID, id)
        .await
        .unwrap()
        .unwrap()
}
