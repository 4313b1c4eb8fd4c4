//! Status enums and read DTOs for the purchase-order lifecycle
//!
//! Status values are closed sets modelled as enums so every transition
//! site matches exhaustively; an illegal transition fails to compile
//! rather than slipping through as a free-form string.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Status
// ============================================================================

/// Purchase-order lifecycle status
///
/// `DRAFT → PENDING → PROCESSING → {COMPLETED | PARTIALLY_COMPLETED | FAILED}`
/// with `CANCELLED` reachable from DRAFT/PENDING by explicit user action.
/// Transitions are monotonic: no order ever returns to DRAFT.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Being assembled at checkout; items editable, order deletable
    #[default]
    Draft,
    /// Submitted with ledger records created; items still editable
    Pending,
    /// Orchestrator is executing upstream transactions
    Processing,
    /// Every voucher unit generated
    Completed,
    /// Some units generated, some failed
    PartiallyCompleted,
    /// No unit generated, or funding rejected before execution
    Failed,
    /// Abandoned by the user before processing
    Cancelled,
}

impl OrderStatus {
    /// Items may be added/removed/resized only in these states
    pub fn is_editable(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Pending)
    }

    /// Terminal states set exactly once by the orchestrator
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::PartiallyCompleted
                | OrderStatus::Failed
                | OrderStatus::Cancelled
        )
    }
}

// ============================================================================
// Voucher (Ledger) Status
// ============================================================================

/// Per-unit ledger record status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    /// Created, no upstream call attempted yet
    #[default]
    Pending,
    /// Upstream call in flight
    Processing,
    /// Provider issued the voucher
    Generated,
    /// Transport or provider-reported failure
    Failed,
}

impl VoucherStatus {
    /// Whether this record has reached its final outcome
    pub fn is_resolved(&self) -> bool {
        matches!(self, VoucherStatus::Generated | VoucherStatus::Failed)
    }
}

// ============================================================================
// Failure Kind
// ============================================================================

/// Why a purchase order ended FAILED.
///
/// Funding failures are recoverable by re-running reconciliation (the
/// balance may have grown or prices dropped); processing losses are
/// only recoverable per-voucher via retry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Balance could not cover the order total; nothing was spent
    Funding,
    /// Execution ran and every unit failed
    Processing,
}

// ============================================================================
// Status View
// ============================================================================

/// Read model returned by `get_status` for caller display/polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderStatusView {
    pub order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub vouchers_ordered: i32,
    pub vouchers_generated: i32,
    pub vouchers_failed: i32,
    pub total_wholesale_cost: Decimal,
    /// Provider settlement currency (fixed per provider)
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_before: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Decimal>,
    /// Unix millis when processing started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<i64>,
    /// Unix millis when the terminal status was set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_states_are_draft_and_pending() {
        assert!(OrderStatus::Draft.is_editable());
        assert!(OrderStatus::Pending.is_editable());
        assert!(!OrderStatus::Processing.is_editable());
        assert!(!OrderStatus::Completed.is_editable());
        assert!(!OrderStatus::Failed.is_editable());
        assert!(!OrderStatus::Cancelled.is_editable());
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Draft.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::PartiallyCompleted.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn voucher_resolution() {
        assert!(!VoucherStatus::Pending.is_resolved());
        assert!(!VoucherStatus::Processing.is_resolved());
        assert!(VoucherStatus::Generated.is_resolved());
        assert!(VoucherStatus::Failed.is_resolved());
    }
}
