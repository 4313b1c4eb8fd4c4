//! Bulk voucher purchase engine
//!
//! Buys digital vouchers in bulk from an upstream provider on behalf of
//! a merchant store and hands the generated codes to the storefront for
//! attachment. The engine owns the purchase-order lifecycle: balance
//! and pricing reconciliation against the volatile upstream, one
//! idempotency-keyed upstream transaction per physical voucher unit,
//! partial-failure bookkeeping, and the final status/counter rollup.
//!
//! The HTTP/CLI surface, store management, credential encryption and
//! catalog synchronisation live outside this crate; callers invoke the
//! [`purchase::OrderOrchestrator`] operations with plain identifiers
//! and poll [`purchase::OrderOrchestrator::get_status`] for progress.

pub mod attach;
pub mod config;
pub mod db;
pub mod logging;
pub mod provider;
pub mod purchase;

pub use config::EngineConfig;
pub use db::Database;
pub use purchase::OrderOrchestrator;
