//! # Repository Module
//!
//! Database repository implementations for the Caixa ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Reads (and single-row writes) go through an instance:                 │
//! │                                                                         │
//! │      db.installments().list_open(tenant_id)                            │
//! │           │                                                             │
//! │           └── &self.pool                                               │
//! │                                                                         │
//! │  Multi-row writes use the associated *_with_tx functions with a        │
//! │  connection borrowed from an open transaction:                         │
//! │                                                                         │
//! │      let mut tx = db.begin().await?;                                   │
//! │      SaleRepository::insert_with_tx(&mut tx, &sale).await?;            │
//! │      InstallmentRepository::insert_with_tx(&mut tx, &inst).await?;     │
//! │      OutboxRepository::append_with_tx(&mut tx, ...).await?;            │
//! │      tx.commit().await?;                                               │
//! │                                                                         │
//! │  SQL stays in this module; callers never see a query string.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Stock reads and guarded decrement
//! - [`SaleRepository`](sale::SaleRepository) - Sale headers and items
//! - [`InstallmentRepository`](installment::InstallmentRepository) - Installment subledger
//! - [`PaymentRepository`](payment::PaymentRepository) - Accepted installment payments
//! - [`CashFlowRepository`](cash_flow::CashFlowRepository) - Cash-flow ledger
//! - [`CustomerAggregateRepository`](customer::CustomerAggregateRepository) - Purchase totals
//! - [`OutboxRepository`](outbox::OutboxRepository) - Domain event queue

pub mod cash_flow;
pub mod customer;
pub mod installment;
pub mod outbox;
pub mod payment;
pub mod product;
pub mod sale;
