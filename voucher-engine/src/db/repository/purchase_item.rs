//! Purchase Item Repository

use super::{parse_record_id, BaseRepository, RepoError, RepoResult};
use crate::db::models::{PurchaseItem, PurchaseItemCreate};
use rust_decimal::Decimal;
use shared::money;
use shared::util::{now_millis, snowflake_id};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

pub const ITEM_TABLE: &str = "purchase_item";

#[derive(Clone)]
pub struct PurchaseItemRepository {
    base: BaseRepository,
}

impl PurchaseItemRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn record_id(&self, id: &str) -> RepoResult<RecordId> {
        parse_record_id(ITEM_TABLE, id)
    }

    pub async fn create(
        &self,
        order_id: RecordId,
        data: PurchaseItemCreate,
        currency: String,
    ) -> RepoResult<PurchaseItem> {
        if data.quantity_ordered <= 0 {
            return Err(RepoError::Validation(format!(
                "quantity must be positive, got {}",
                data.quantity_ordered
            )));
        }
        let unit_wholesale_price = money::round_wholesale(data.unit_wholesale_price);
        let item = PurchaseItem {
            id: None,
            order_id,
            voucher_type: data.voucher_type,
            provider_code: data.provider_code,
            option_code: data.option_code,
            display_name: data.display_name,
            destination_product_id: data.destination_product_id,
            quantity_ordered: data.quantity_ordered,
            unit_face_value: money::round_face(data.unit_face_value),
            unit_wholesale_price,
            total_wholesale_cost: money::line_total(data.quantity_ordered, unit_wholesale_price),
            currency,
            created_at: now_millis(),
        };

        let rid = RecordId::from_table_key(ITEM_TABLE, snowflake_id().to_string());
        let created: Option<PurchaseItem> = self.base.db().create(rid).content(item).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create purchase item".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<PurchaseItem>> {
        let rid = self.record_id(id)?;
        let item: Option<PurchaseItem> = self.base.db().select(rid).await?;
        Ok(item)
    }

    pub async fn get(&self, id: &str) -> RepoResult<PurchaseItem> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Purchase item {id}")))
    }

    /// Items of an order, in insertion order (the execution order)
    pub async fn find_by_order(&self, order_id: &RecordId) -> RepoResult<Vec<PurchaseItem>> {
        let items: Vec<PurchaseItem> = self
            .base
            .db()
            .query("SELECT * FROM purchase_item WHERE order_id = $order ORDER BY created_at")
            .bind(("order", order_id.clone()))
            .await?
            .take(0)?;
        Ok(items)
    }

    /// Change the quantity; the line total is recomputed in the same write
    pub async fn update_quantity(&self, id: &str, quantity: i32) -> RepoResult<PurchaseItem> {
        if quantity <= 0 {
            return Err(RepoError::Validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        let item = self.get(id).await?;
        let total = money::line_total(quantity, item.unit_wholesale_price);
        self.apply_update(id, quantity, item.unit_wholesale_price, total)
            .await
    }

    /// Overwrite the unit wholesale price (reconciliation); the line
    /// total is recomputed in the same write
    pub async fn update_pricing(
        &self,
        id: &str,
        unit_wholesale_price: Decimal,
    ) -> RepoResult<PurchaseItem> {
        let item = self.get(id).await?;
        let price = money::round_wholesale(unit_wholesale_price);
        let total = money::line_total(item.quantity_ordered, price);
        self.apply_update(id, item.quantity_ordered, price, total)
            .await
    }

    async fn apply_update(
        &self,
        id: &str,
        quantity: i32,
        unit_wholesale_price: Decimal,
        total_wholesale_cost: Decimal,
    ) -> RepoResult<PurchaseItem> {
        let rid = self.record_id(id)?;
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET quantity_ordered = $quantity, \
                 unit_wholesale_price = $price, total_wholesale_cost = $total RETURN AFTER",
            )
            .bind(("id", rid))
            .bind(("quantity", quantity))
            .bind(("price", unit_wholesale_price))
            .bind(("total", total_wholesale_cost))
            .await?;
        let updated: Vec<PurchaseItem> = result.take(0)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Purchase item {id}")))
    }

    /// Delete an item together with its ledger records, transactionally
    pub async fn delete_with_details(&self, id: &str) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "BEGIN TRANSACTION; \
                 DELETE voucher_detail WHERE item_id = $id; \
                 DELETE $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", rid))
            .await?
            .check()?;
        Ok(())
    }
}
