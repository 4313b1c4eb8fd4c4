//! Voucher Detail Ledger Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::purchase::VoucherStatus;
use surrealdb::RecordId;

/// Per-unit ledger record — the unit of external work.
///
/// `external_id` is the idempotency key presented to the upstream
/// provider: globally unique, derived as
/// `{order_number}-{option_code}-{sequence:03}`, and never reused after
/// a failure (retries keep the same id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherDetail {
    pub id: Option<RecordId>,
    pub order_id: RecordId,
    /// Referenced (not owned): pricing/option lookups during execution
    pub item_id: RecordId,
    pub external_id: String,
    /// Monotonic per order; survives item edits
    pub sequence: i32,
    #[serde(default)]
    pub status: VoucherStatus,
    #[serde(default)]
    pub operation_succeeded: bool,
    pub serial_number: Option<String>,
    /// Redeemable reference/code handed to the storefront
    pub reference_code: Option<String>,
    pub redeem_url: Option<String>,
    pub transaction_id: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub settled_amount: Option<Decimal>,
    pub error_message: Option<String>,
    pub request_sent_at: Option<i64>,
    pub response_received_at: Option<i64>,
    pub response_time_ms: Option<i64>,
    /// Incremented on transport failures only; provider-reported
    /// business failures leave it untouched
    #[serde(default)]
    pub retry_count: i32,
    /// Whether the storefront confirmed attaching this code
    #[serde(default)]
    pub wp_synced: bool,
    pub wp_synced_at: Option<i64>,
    pub created_at: i64,
}

impl VoucherDetail {
    pub fn id_string(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default()
    }
}

/// Row construction for ledger creation at submit/resize time
#[derive(Debug, Clone, Serialize)]
pub struct VoucherDetailCreate {
    pub order_id: RecordId,
    pub item_id: RecordId,
    pub external_id: String,
    pub sequence: i32,
    pub status: VoucherStatus,
    pub operation_succeeded: bool,
    pub retry_count: i32,
    pub wp_synced: bool,
    pub created_at: i64,
}

impl VoucherDetailCreate {
    pub fn new(order_id: RecordId, item_id: RecordId, external_id: String, sequence: i32) -> Self {
        Self {
            order_id,
            item_id,
            external_id,
            sequence,
            status: VoucherStatus::Pending,
            operation_succeeded: false,
            retry_count: 0,
            wp_synced: false,
            created_at: shared::util::now_millis(),
        }
    }
}
