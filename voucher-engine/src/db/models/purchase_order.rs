//! Purchase Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::purchase::{FailureKind, OrderStatus, OrderStatusView};
use surrealdb::RecordId;

/// Purchase order — the aggregate root of one merchant checkout session.
///
/// Owns its items and voucher ledger records (cascade delete). Status
/// transitions are monotonic; counters are only recomputed from ledger
/// statuses after a full execution pass, never incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: Option<RecordId>,
    /// Key of the owning store's profile (provider credentials lookup)
    pub store_key: String,
    /// Identifier of the user who created the checkout session
    pub created_by: String,
    /// Human order number, date-sequenced: PO-YYYYMMDD-NNN
    pub order_number: String,
    #[serde(default)]
    pub status: OrderStatus,
    /// Provider settlement currency
    pub currency: String,
    /// Sum of item line costs (wholesale, 4 dp)
    #[serde(default)]
    pub total_wholesale_cost: Decimal,
    #[serde(default)]
    pub vouchers_ordered: i32,
    #[serde(default)]
    pub vouchers_generated: i32,
    #[serde(default)]
    pub vouchers_failed: i32,
    /// Prepaid balance snapshot taken right before execution
    pub balance_before: Option<Decimal>,
    /// Balance re-read after the execution pass
    pub balance_after: Option<Decimal>,
    pub processing_started_at: Option<i64>,
    pub processing_completed_at: Option<i64>,
    pub failure_kind: Option<FailureKind>,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
    /// Optional deep link into the storefront admin for this order
    pub admin_url: Option<String>,
    /// Next ledger sequence number for this order. Monotonic: tail
    /// deletions never hand a sequence back, so external ids are never
    /// reused across item edits.
    #[serde(default = "default_next_sequence")]
    pub next_sequence: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

fn default_next_sequence() -> i32 {
    1
}

impl PurchaseOrder {
    /// Plain string id ("purchase_order:…") for callers
    pub fn id_string(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default()
    }

    /// Read model for status polling
    pub fn to_view(&self) -> OrderStatusView {
        OrderStatusView {
            order_id: self.id_string(),
            order_number: self.order_number.clone(),
            status: self.status,
            vouchers_ordered: self.vouchers_ordered,
            vouchers_generated: self.vouchers_generated,
            vouchers_failed: self.vouchers_failed,
            total_wholesale_cost: self.total_wholesale_cost,
            currency: self.currency.clone(),
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            processing_started_at: self.processing_started_at,
            processing_completed_at: self.processing_completed_at,
            failure_kind: self.failure_kind,
            error_message: self.error_message.clone(),
            success_message: self.success_message.clone(),
        }
    }
}

/// Fields callers provide when opening a checkout session
#[derive(Debug, Clone)]
pub struct PurchaseOrderCreate {
    pub store_key: String,
    pub created_by: String,
    pub currency: String,
}
