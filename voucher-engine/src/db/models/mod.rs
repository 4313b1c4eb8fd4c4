//! Database models
//!
//! One file per table. Models carry `Option<RecordId>` ids (None until
//! created) plus Create DTOs where callers construct new rows.

mod catalog_price;
mod purchase_item;
mod purchase_order;
mod store_profile;
mod voucher_detail;

pub use catalog_price::CatalogPrice;
pub use purchase_item::{PurchaseItem, PurchaseItemCreate};
pub use purchase_order::{PurchaseOrder, PurchaseOrderCreate};
pub use store_profile::StoreProfile;
pub use voucher_detail::{VoucherDetail, VoucherDetailCreate};
