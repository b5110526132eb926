//! # Seed Data Generator
//!
//! Populates a development database with products and stock so sales can
//! be committed against it.
//!
//! ## Usage
//! ```bash
//! # 200 products (default) for the default tenant
//! cargo run -p caixa-db --bin seed
//!
//! # Custom amount, path and tenant
//! cargo run -p caixa-db --bin seed -- --count 500 --db ./data/ledger.db --tenant <uuid>
//! ```
//!
//! Each product gets a name `{Item} {Color} {Size}`, a price between
//! 19.90 and 199.90, a cost of 40-60% of the price and 0-50 units in stock.

use caixa_core::{Product, DEFAULT_TENANT_ID};
use caixa_db::repository::product::generate_product_id;
use caixa_db::{Database, DbConfig};
use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ITEMS: &[&str] = &[
    "Camiseta",
    "Regata",
    "Blusa",
    "Camisa",
    "Vestido",
    "Saia",
    "Calça Jeans",
    "Bermuda",
    "Short",
    "Jaqueta",
    "Moletom",
    "Cardigã",
    "Macacão",
    "Legging",
    "Pijama",
];

const COLORS: &[&str] = &["Preto", "Branco", "Azul", "Vermelho", "Verde", "Bege"];

/// Size and price addon in cents.
const SIZES: &[(&str, i64)] = &[("P", 0), ("M", 0), ("G", 500), ("GG", 1_000)];

struct SeedArgs {
    count: usize,
    db_path: String,
    tenant_id: String,
}

impl SeedArgs {
    /// `None` when `--help` was printed.
    fn parse(args: &[String]) -> Option<Self> {
        let mut parsed = SeedArgs {
            count: 200,
            db_path: String::from("./caixa_dev.db"),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
        };

        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--count" | "-c" => {
                    if let Some(value) = iter.next() {
                        parsed.count = value.parse().unwrap_or(200);
                    }
                }
                "--db" | "-d" => {
                    if let Some(value) = iter.next() {
                        parsed.db_path = value.clone();
                    }
                }
                "--tenant" | "-t" => {
                    if let Some(value) = iter.next() {
                        parsed.tenant_id = value.clone();
                    }
                }
                "--help" | "-h" => {
                    println!("Usage: seed [--count N] [--db PATH] [--tenant ID]");
                    println!();
                    println!("  -c, --count <N>     Products to generate (default: 200)");
                    println!("  -d, --db <PATH>     Database file (default: ./caixa_dev.db)");
                    println!("  -t, --tenant <ID>   Tenant to seed (default: {DEFAULT_TENANT_ID})");
                    return None;
                }
                other => warn!(argument = %other, "Ignoring unknown argument"),
            }
        }

        Some(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,sqlx=warn".into()))
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(args) = SeedArgs::parse(&args) else {
        return Ok(());
    };

    let db = Database::new(DbConfig::new(&args.db_path)).await?;

    let existing = db.products().count(&args.tenant_id).await?;
    if existing > 0 {
        warn!(tenant_id = %args.tenant_id, existing, "Tenant already has products, skipping seed");
        db.close().await;
        return Ok(());
    }

    let started = std::time::Instant::now();
    let mut generated = 0usize;
    let mut units = 0i64;

    let combos = ITEMS
        .iter()
        .flat_map(|item| COLORS.iter().map(move |color| (item, color)))
        .flat_map(|(item, color)| SIZES.iter().map(move |size| (item, color, size)));

    for (seed, (item, color, (size, addon))) in combos.take(args.count).enumerate() {
        let product = generate_product(&args.tenant_id, item, color, size, *addon, seed);

        match db.products().insert(&product).await {
            Ok(_) => {
                generated += 1;
                units += product.stock_quantity;
            }
            Err(e) => warn!(name = %product.name, error = %e, "Product insert failed"),
        }
    }

    info!(
        db = %args.db_path,
        tenant_id = %args.tenant_id,
        generated,
        units,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Seed complete"
    );

    db.close().await;
    Ok(())
}

/// Name, price and stock depend only on `seed`; the id is fresh.
fn generate_product(
    tenant_id: &str,
    item: &str,
    color: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    // 19.90 - 199.90 in ten-cent steps ending in 0.90
    let price_cents = 1_990 + ((seed * 37) % 19) as i64 * 1_000 + price_addon;
    let cost_pct = 40 + (seed % 21) as i64;

    Product {
        id: generate_product_id(),
        tenant_id: tenant_id.to_string(),
        name: format!("{} {} {}", item, color, size),
        price_cents,
        cost_cents: price_cents * cost_pct / 100,
        stock_quantity: (seed % 51) as i64,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
