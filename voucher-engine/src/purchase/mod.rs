//! Purchase-order lifecycle
//!
//! `OrderOrchestrator` drives the state machine
//! `DRAFT → PENDING → PROCESSING → terminal`; the reconciler checks
//! funding against live upstream pricing, the executor performs one
//! idempotency-keyed upstream transaction per voucher unit, and the
//! pacer spaces bursts of successful transactions.

pub mod executor;
pub mod numbering;
pub mod orchestrator;
pub mod pacer;
pub mod reconciler;

pub use executor::{ExecutionOutcome, TransactionExecutor};
pub use numbering::OrderNumberGenerator;
pub use orchestrator::OrderOrchestrator;
pub use pacer::Pacer;
pub use reconciler::{BalanceReconciler, ReconcileOutcome, ReconcileReport};
