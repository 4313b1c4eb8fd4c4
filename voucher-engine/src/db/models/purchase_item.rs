//! Purchase Item Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// One line of "N units of option X at price Y" within an order.
///
/// Owned exclusively by its purchase order; deleting the order
/// cascades. `total_wholesale_cost` is recomputed on every quantity or
/// price change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub id: Option<RecordId>,
    /// Record link to the owning purchase order
    pub order_id: RecordId,
    /// Voucher family at the provider (e.g. "GIFTCARD")
    pub voucher_type: String,
    /// Provider product code
    pub provider_code: String,
    /// Option code used in pricing and issue requests
    pub option_code: String,
    pub display_name: String,
    /// Storefront product the generated codes attach to
    pub destination_product_id: String,
    pub quantity_ordered: i32,
    /// Redeemable denomination per unit (2 dp)
    pub unit_face_value: Decimal,
    /// Merchant cost per unit (4 dp), refreshed by reconciliation
    pub unit_wholesale_price: Decimal,
    /// quantity_ordered × unit_wholesale_price
    pub total_wholesale_cost: Decimal,
    pub currency: String,
    pub created_at: i64,
}

impl PurchaseItem {
    pub fn id_string(&self) -> String {
        self.id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default()
    }
}

/// Fields callers provide when adding a line to an editable order
#[derive(Debug, Clone)]
pub struct PurchaseItemCreate {
    pub voucher_type: String,
    pub provider_code: String,
    pub option_code: String,
    pub display_name: String,
    pub destination_product_id: String,
    pub quantity_ordered: i32,
    pub unit_face_value: Decimal,
    pub unit_wholesale_price: Decimal,
}
