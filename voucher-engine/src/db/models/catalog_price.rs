//! Catalog Price Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

/// Storefront cost basis per voucher option.
///
/// Reconciliation writes the refreshed wholesale price here (best
/// effort) so future listings share the same cost basis; attachment
/// bumps `stock_quantity` by the number of newly attached codes.
/// Record key is the option code, so writes are natural upserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPrice {
    pub id: Option<RecordId>,
    pub option_code: String,
    /// Zero until the first reconciliation writes a real price
    #[serde(default)]
    pub unit_wholesale_price: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub stock_quantity: i32,
    pub updated_at: i64,
}
