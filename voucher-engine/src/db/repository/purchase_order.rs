//! Purchase Order Repository

use super::{parse_record_id, BaseRepository, RepoError, RepoResult};
use crate::db::models::{PurchaseOrder, PurchaseOrderCreate};
use rust_decimal::Decimal;
use shared::purchase::{FailureKind, OrderStatus};
use shared::util::{now_millis, snowflake_id};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

pub const ORDER_TABLE: &str = "purchase_order";

#[derive(Clone)]
pub struct PurchaseOrderRepository {
    base: BaseRepository,
}

impl PurchaseOrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn record_id(&self, id: &str) -> RepoResult<RecordId> {
        parse_record_id(ORDER_TABLE, id)
    }

    /// Create a new order in DRAFT with a pre-generated order number
    pub async fn create(
        &self,
        data: PurchaseOrderCreate,
        order_number: String,
    ) -> RepoResult<PurchaseOrder> {
        let now = now_millis();
        let order = PurchaseOrder {
            id: None,
            store_key: data.store_key,
            created_by: data.created_by,
            order_number,
            status: OrderStatus::Draft,
            currency: data.currency,
            total_wholesale_cost: Decimal::ZERO,
            vouchers_ordered: 0,
            vouchers_generated: 0,
            vouchers_failed: 0,
            balance_before: None,
            balance_after: None,
            processing_started_at: None,
            processing_completed_at: None,
            failure_kind: None,
            error_message: None,
            success_message: None,
            admin_url: None,
            next_sequence: 1,
            created_at: now,
            updated_at: now,
        };

        let rid = RecordId::from_table_key(ORDER_TABLE, snowflake_id().to_string());
        let created: Option<PurchaseOrder> = self.base.db().create(rid).content(order).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create purchase order".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<PurchaseOrder>> {
        let rid = self.record_id(id)?;
        let order: Option<PurchaseOrder> = self.base.db().select(rid).await?;
        Ok(order)
    }

    /// Load an order or fail with NotFound
    pub async fn get(&self, id: &str) -> RepoResult<PurchaseOrder> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Purchase order {id}")))
    }

    pub async fn set_status(&self, id: &str, status: OrderStatus) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query("UPDATE $id SET status = $status, updated_at = $now")
            .bind(("id", rid))
            .bind(("status", status))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Update order-level totals after an item edit or reconciliation
    pub async fn set_totals(
        &self,
        id: &str,
        total_wholesale_cost: Decimal,
        vouchers_ordered: i32,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query("UPDATE $id SET total_wholesale_cost = $total, vouchers_ordered = $ordered, updated_at = $now")
            .bind(("id", rid))
            .bind(("total", total_wholesale_cost))
            .bind(("ordered", vouchers_ordered))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Terminal FAILED with a cause; used before any money is spent
    /// (funding) or after a total execution loss (processing)
    pub async fn mark_failed(
        &self,
        id: &str,
        kind: FailureKind,
        message: String,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, failure_kind = $kind, error_message = $message, \
                 success_message = NONE, processing_completed_at = $now, updated_at = $now",
            )
            .bind(("id", rid))
            .bind(("status", OrderStatus::Failed))
            .bind(("kind", kind))
            .bind(("message", message))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// PENDING → PROCESSING with the balance-before snapshot
    pub async fn mark_processing(&self, id: &str, balance_before: Decimal) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, balance_before = $balance, \
                 processing_started_at = $now, error_message = NONE, updated_at = $now",
            )
            .bind(("id", rid))
            .bind(("status", OrderStatus::Processing))
            .bind(("balance", balance_before))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Set the terminal status and rolled-up counters in one write,
    /// after the full execution pass (never incrementally per record)
    #[allow(clippy::too_many_arguments)]
    pub async fn finalize(
        &self,
        id: &str,
        status: OrderStatus,
        generated: i32,
        failed: i32,
        balance_after: Option<Decimal>,
        failure_kind: Option<FailureKind>,
        error_message: Option<String>,
        success_message: Option<String>,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, vouchers_generated = $generated, \
                 vouchers_failed = $failed, balance_after = $balance_after, \
                 failure_kind = $kind, error_message = $error_message, \
                 success_message = $success_message, processing_completed_at = $now, \
                 updated_at = $now",
            )
            .bind(("id", rid))
            .bind(("status", status))
            .bind(("generated", generated))
            .bind(("failed", failed))
            .bind(("balance_after", balance_after))
            .bind(("kind", failure_kind))
            .bind(("error_message", error_message))
            .bind(("success_message", success_message))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Refresh counters without touching status (used by retry-failed)
    pub async fn update_counts(&self, id: &str, generated: i32, failed: i32) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET vouchers_generated = $generated, vouchers_failed = $failed, \
                 updated_at = $now",
            )
            .bind(("id", rid))
            .bind(("generated", generated))
            .bind(("failed", failed))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Reconciliation found the funding failure no longer applies:
    /// FAILED(funding) → PENDING with the error cleared
    pub async fn reset_funding_failure(&self, id: &str) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, failure_kind = NONE, error_message = NONE, \
                 processing_completed_at = NONE, updated_at = $now",
            )
            .bind(("id", rid))
            .bind(("status", OrderStatus::Pending))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Attach an error message without changing status (order-level
    /// failure mid-step; caller may retry confirm)
    pub async fn set_error_message(&self, id: &str, message: String) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query("UPDATE $id SET error_message = $message, updated_at = $now")
            .bind(("id", rid))
            .bind(("message", message))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }

    /// Reserve `count` ledger sequence numbers; returns the first of
    /// the reserved block. The counter never decreases, so freed
    /// sequences are never reissued.
    pub async fn allocate_sequences(&self, id: &str, count: i32) -> RepoResult<i32> {
        let rid = self.record_id(id)?;
        let mut result = self
            .base
            .db()
            .query("UPDATE $id SET next_sequence += $count, updated_at = $now RETURN BEFORE")
            .bind(("id", rid))
            .bind(("count", count))
            .bind(("now", now_millis()))
            .await?;
        let before: Vec<PurchaseOrder> = result.take(0)?;
        before
            .into_iter()
            .next()
            .map(|o| o.next_sequence)
            .ok_or_else(|| RepoError::NotFound(format!("Purchase order {id}")))
    }

    /// Cascade delete the whole aggregate (details, items, order) in a
    /// single transaction. Only DRAFT orders may be deleted; the caller
    /// enforces that.
    pub async fn delete_cascade(&self, id: &str) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "BEGIN TRANSACTION; \
                 DELETE voucher_detail WHERE order_id = $id; \
                 DELETE purchase_item WHERE order_id = $id; \
                 DELETE $id; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", rid))
            .await?
            .check()?;
        Ok(())
    }
}
