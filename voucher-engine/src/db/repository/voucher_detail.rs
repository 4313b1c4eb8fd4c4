//! Voucher Detail Ledger Repository

use super::{parse_record_id, BaseRepository, RepoError, RepoResult};
use crate::db::models::{VoucherDetail, VoucherDetailCreate};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::purchase::VoucherStatus;
use shared::util::now_millis;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

pub const DETAIL_TABLE: &str = "voucher_detail";

#[derive(Debug, Deserialize)]
struct CountRow {
    total: i64,
}

/// Upstream response fields captured on a generated voucher
#[derive(Debug, Clone)]
pub struct GeneratedFields {
    pub serial_number: String,
    pub reference_code: String,
    pub redeem_url: Option<String>,
    pub transaction_id: String,
    pub provider_transaction_id: String,
    pub settled_amount: Decimal,
}

#[derive(Clone)]
pub struct VoucherDetailRepository {
    base: BaseRepository,
}

impl VoucherDetailRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn record_id(&self, id: &str) -> RepoResult<RecordId> {
        parse_record_id(DETAIL_TABLE, id)
    }

    /// Insert a batch of freshly allocated ledger rows
    pub async fn create_batch(
        &self,
        rows: Vec<VoucherDetailCreate>,
    ) -> RepoResult<Vec<VoucherDetail>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let created: Vec<VoucherDetail> = self.base.db().insert(DETAIL_TABLE).content(rows).await?;
        Ok(created)
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<VoucherDetail>> {
        let rid = self.record_id(id)?;
        let detail: Option<VoucherDetail> = self.base.db().select(rid).await?;
        Ok(detail)
    }

    pub async fn get(&self, id: &str) -> RepoResult<VoucherDetail> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Voucher detail {id}")))
    }

    /// All ledger rows of an order in ascending sequence
    pub async fn find_by_order(&self, order_id: &RecordId) -> RepoResult<Vec<VoucherDetail>> {
        let details: Vec<VoucherDetail> = self
            .base
            .db()
            .query("SELECT * FROM voucher_detail WHERE order_id = $order ORDER BY sequence")
            .bind(("order", order_id.clone()))
            .await?
            .take(0)?;
        Ok(details)
    }

    /// Ledger rows of an order in a given status, ascending sequence
    pub async fn find_by_order_and_status(
        &self,
        order_id: &RecordId,
        status: VoucherStatus,
    ) -> RepoResult<Vec<VoucherDetail>> {
        let details: Vec<VoucherDetail> = self
            .base
            .db()
            .query(
                "SELECT * FROM voucher_detail WHERE order_id = $order AND status = $status \
                 ORDER BY sequence",
            )
            .bind(("order", order_id.clone()))
            .bind(("status", status))
            .await?
            .take(0)?;
        Ok(details)
    }

    /// FAILED rows still under the retry cap, ascending sequence
    pub async fn find_failed_retryable(
        &self,
        order_id: &RecordId,
        retry_cap: u32,
    ) -> RepoResult<Vec<VoucherDetail>> {
        let details: Vec<VoucherDetail> = self
            .base
            .db()
            .query(
                "SELECT * FROM voucher_detail WHERE order_id = $order AND status = $status \
                 AND retry_count < $cap ORDER BY sequence",
            )
            .bind(("order", order_id.clone()))
            .bind(("status", VoucherStatus::Failed))
            .bind(("cap", retry_cap as i64))
            .await?
            .take(0)?;
        Ok(details)
    }

    /// Ledger rows of one item, ascending sequence
    pub async fn find_by_item(&self, item_id: &RecordId) -> RepoResult<Vec<VoucherDetail>> {
        let details: Vec<VoucherDetail> = self
            .base
            .db()
            .query("SELECT * FROM voucher_detail WHERE item_id = $item ORDER BY sequence")
            .bind(("item", item_id.clone()))
            .await?
            .take(0)?;
        Ok(details)
    }

    /// Count rows of an order in a given status
    pub async fn count_by_status(
        &self,
        order_id: &RecordId,
        status: VoucherStatus,
    ) -> RepoResult<i64> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS total FROM voucher_detail \
                 WHERE order_id = $order AND status = $status GROUP ALL",
            )
            .bind(("order", order_id.clone()))
            .bind(("status", status))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.total).unwrap_or(0))
    }

    /// Quantity decrease: drop the item's highest-sequence rows.
    /// Sequences are selected first so the delete can't touch rows of
    /// another item even under concurrent edits.
    pub async fn delete_tail(&self, item_id: &RecordId, count: usize) -> RepoResult<()> {
        if count == 0 {
            return Ok(());
        }
        let existing = self.find_by_item(item_id).await?;
        let tail: Vec<i32> = existing
            .iter()
            .rev()
            .take(count)
            .map(|d| d.sequence)
            .collect();
        if tail.is_empty() {
            return Ok(());
        }
        self.base
            .db()
            .query("DELETE voucher_detail WHERE item_id = $item AND sequence IN $tail")
            .bind(("item", item_id.clone()))
            .bind(("tail", tail))
            .await?
            .check()?;
        Ok(())
    }

    /// First attempt step: PENDING/FAILED → PROCESSING with request stamp
    pub async fn mark_processing(&self, id: &str, request_sent_at: i64) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, request_sent_at = $sent, \
                 response_received_at = NONE, response_time_ms = NONE",
            )
            .bind(("id", rid))
            .bind(("status", VoucherStatus::Processing))
            .bind(("sent", request_sent_at))
            .await?
            .check()?;
        Ok(())
    }

    /// Provider issued the voucher: capture the response payload
    pub async fn mark_generated(
        &self,
        id: &str,
        fields: GeneratedFields,
        response_received_at: i64,
        response_time_ms: i64,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, operation_succeeded = true, \
                 serial_number = $serial, reference_code = $reference, redeem_url = $redeem, \
                 transaction_id = $tx, provider_transaction_id = $provider_tx, \
                 settled_amount = $settled, error_message = NONE, \
                 response_received_at = $received, response_time_ms = $elapsed",
            )
            .bind(("id", rid))
            .bind(("status", VoucherStatus::Generated))
            .bind(("serial", fields.serial_number))
            .bind(("reference", fields.reference_code))
            .bind(("redeem", fields.redeem_url))
            .bind(("tx", fields.transaction_id))
            .bind(("provider_tx", fields.provider_transaction_id))
            .bind(("settled", fields.settled_amount))
            .bind(("received", response_received_at))
            .bind(("elapsed", response_time_ms))
            .await?
            .check()?;
        Ok(())
    }

    /// Transport fault: FAILED and the retry counter advances
    pub async fn mark_failed_transport(
        &self,
        id: &str,
        error_message: String,
        response_received_at: i64,
        response_time_ms: i64,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, operation_succeeded = false, \
                 error_message = $message, retry_count += 1, \
                 response_received_at = $received, response_time_ms = $elapsed",
            )
            .bind(("id", rid))
            .bind(("status", VoucherStatus::Failed))
            .bind(("message", error_message))
            .bind(("received", response_received_at))
            .bind(("elapsed", response_time_ms))
            .await?
            .check()?;
        Ok(())
    }

    /// Provider-reported business failure: FAILED, retry counter
    /// untouched (the caller decides whether a re-attempt makes sense)
    pub async fn mark_failed_business(
        &self,
        id: &str,
        error_message: String,
        response_received_at: i64,
        response_time_ms: i64,
    ) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query(
                "UPDATE $id SET status = $status, operation_succeeded = false, \
                 error_message = $message, \
                 response_received_at = $received, response_time_ms = $elapsed",
            )
            .bind(("id", rid))
            .bind(("status", VoucherStatus::Failed))
            .bind(("message", error_message))
            .bind(("received", response_received_at))
            .bind(("elapsed", response_time_ms))
            .await?
            .check()?;
        Ok(())
    }

    /// Storefront confirmed attaching this code
    pub async fn mark_synced(&self, id: &str) -> RepoResult<()> {
        let rid = self.record_id(id)?;
        self.base
            .db()
            .query("UPDATE $id SET wp_synced = true, wp_synced_at = $now")
            .bind(("id", rid))
            .bind(("now", now_millis()))
            .await?
            .check()?;
        Ok(())
    }
}
