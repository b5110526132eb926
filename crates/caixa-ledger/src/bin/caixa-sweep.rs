//! # Overdue Sweep Runner
//!
//! Marks overdue installments for one tenant, then drains the ledger
//! outbox. Meant to be run by cron or any external scheduler.
//!
//! ## Usage
//! ```bash
//! # Sweep the default tenant as of today
//! cargo run -p caixa-ledger --bin caixa-sweep
//!
//! # Explicit config, tenant and date
//! caixa-sweep --config /etc/caixa/ledger.toml --tenant <uuid> --date 2025-03-01
//! ```

use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use caixa_core::{Actor, DEFAULT_TENANT_ID};
use caixa_ledger::events::{dispatch_pending, LogSubscriber, OutboxSubscriber};
use caixa_ledger::logging::init_tracing;
use caixa_ledger::{Ledger, LedgerConfig};

/// Outbox entries delivered per run.
const DISPATCH_BATCH: u32 = 500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut tenant_id = DEFAULT_TENANT_ID.to_string();
    let mut user_id = String::from("caixa-sweep");
    let mut date: Option<NaiveDate> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--date" | "-d" => {
                if i + 1 < args.len() {
                    date = Some(NaiveDate::parse_from_str(&args[i + 1], "%Y-%m-%d")?);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caixa Ledger Overdue Sweep");
                println!();
                println!("Usage: caixa-sweep [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>   Config file (default: platform config dir)");
                println!("  -t, --tenant <ID>     Tenant to sweep (default: {DEFAULT_TENANT_ID})");
                println!("  -u, --user <ID>       Actor recorded in logs (default: caixa-sweep)");
                println!("  -d, --date <DATE>     Sweep as of YYYY-MM-DD (default: today)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => eprintln!("Ignoring unknown argument: {}", other),
        }
        i += 1;
    }

    let config = LedgerConfig::load(config_path)?;
    let ledger = Ledger::open(config).await?;
    let actor = Actor::new(user_id, tenant_id);

    let today = date.unwrap_or_else(|| ledger.clock().today());
    let marked = ledger.sweep_overdue(&actor, today).await?;

    let subscribers: Vec<Arc<dyn OutboxSubscriber>> = vec![Arc::new(LogSubscriber)];
    let report = dispatch_pending(ledger.database(), &subscribers, DISPATCH_BATCH).await?;

    println!("Overdue sweep for {} as of {}", actor.tenant_id, today);
    println!("  Marked overdue:   {}", marked);
    println!("  Events delivered: {}", report.delivered);
    println!("  Events failed:    {}", report.failed);
    if report.skipped > 0 {
        println!("  Events skipped:   {} (max attempts reached)", report.skipped);
    }

    ledger.database().close().await;
    Ok(())
}
