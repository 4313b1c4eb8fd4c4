//! Purchase-order orchestrator
//!
//! The single entry point callers use. Owns the order state machine:
//! draft CRUD, submission (ledger materialization), the confirm pass
//! (reconcile, execute, roll up, attach) and the manual retry path.
//! A per-order in-flight gate rejects concurrent confirms; everything
//! else is safe to call concurrently.

use crate::attach::AttachmentNotifier;
use crate::config::EngineConfig;
use crate::db::models::{
    PurchaseItem, PurchaseItemCreate, PurchaseOrder, PurchaseOrderCreate, VoucherDetail,
    VoucherDetailCreate,
};
use crate::db::repository::{
    CatalogPriceRepository, PurchaseItemRepository, PurchaseOrderRepository,
    StoreProfileRepository, VoucherDetailRepository,
};
use crate::db::Database;
use crate::provider::{ProviderCredentials, ProviderSession, VoucherProvider};
use crate::purchase::executor::{ExecutionOutcome, TransactionExecutor};
use crate::purchase::numbering::OrderNumberGenerator;
use crate::purchase::pacer::Pacer;
use crate::purchase::reconciler::{BalanceReconciler, ReconcileReport};
use dashmap::DashSet;
use rust_decimal::Decimal;
use shared::purchase::{FailureKind, OrderStatus, OrderStatusView, VoucherStatus};
use shared::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use surrealdb::RecordId;
use tracing::{error, info, warn};

pub struct OrderOrchestrator {
    orders: PurchaseOrderRepository,
    items: PurchaseItemRepository,
    details: VoucherDetailRepository,
    catalog: CatalogPriceRepository,
    stores: StoreProfileRepository,
    numbering: OrderNumberGenerator,
    reconciler: BalanceReconciler,
    executor: TransactionExecutor,
    provider: Arc<dyn VoucherProvider>,
    notifier: Arc<dyn AttachmentNotifier>,
    config: EngineConfig,
    in_flight: DashSet<String>,
}

/// Removes the order from the in-flight set when the confirm/retry
/// pass ends, error paths included
struct FlightGuard<'a> {
    set: &'a DashSet<String>,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

impl OrderOrchestrator {
    pub fn new(
        database: &Database,
        provider: Arc<dyn VoucherProvider>,
        notifier: Arc<dyn AttachmentNotifier>,
        config: EngineConfig,
    ) -> Self {
        let db = database.handle().clone();
        Self {
            orders: PurchaseOrderRepository::new(db.clone()),
            items: PurchaseItemRepository::new(db.clone()),
            details: VoucherDetailRepository::new(db.clone()),
            catalog: CatalogPriceRepository::new(db.clone()),
            stores: StoreProfileRepository::new(db.clone()),
            numbering: OrderNumberGenerator::new(db.clone()),
            reconciler: BalanceReconciler::new(db.clone(), provider.clone()),
            executor: TransactionExecutor::new(db, provider.clone(), config.retry_cap),
            provider,
            notifier,
            config,
            in_flight: DashSet::new(),
        }
    }

    // ========== Draft CRUD ==========

    pub async fn create_draft(
        &self,
        store_key: &str,
        created_by: &str,
    ) -> AppResult<OrderStatusView> {
        self.stores.get(store_key).await?;
        let order_number = self.numbering.next().await?;
        let order = self
            .orders
            .create(
                PurchaseOrderCreate {
                    store_key: store_key.to_string(),
                    created_by: created_by.to_string(),
                    currency: self.config.settlement_currency.clone(),
                },
                order_number,
            )
            .await?;
        info!(order_id = %order.id_string(), order_number = %order.order_number, "Draft created");
        Ok(order.to_view())
    }

    /// Add a line to an editable order. On a submitted (PENDING) order
    /// the ledger grows in the same call so it keeps tracking the items.
    pub async fn add_item(&self, order_id: &str, data: PurchaseItemCreate) -> AppResult<String> {
        let order = self.editable(order_id).await?;
        let order_rid = Self::rid(&order)?;
        let item = self
            .items
            .create(order_rid.clone(), data, order.currency.clone())
            .await?;

        if order.status == OrderStatus::Pending {
            self.materialize_ledger(&order, &item, item.quantity_ordered)
                .await?;
        }
        self.refresh_totals(&order_rid, order_id).await?;
        Ok(item.id_string())
    }

    pub async fn remove_item(&self, order_id: &str, item_id: &str) -> AppResult<()> {
        let order = self.editable(order_id).await?;
        let item = self.owned_item(&order, item_id).await?;
        self.items.delete_with_details(&item.id_string()).await?;
        self.refresh_totals(&Self::rid(&order)?, order_id).await?;
        Ok(())
    }

    /// Change a line's quantity. On a PENDING order the ledger follows:
    /// shrinking drops the highest-sequence records, growing appends
    /// fresh ones with never-reused sequence numbers.
    pub async fn resize_item(&self, order_id: &str, item_id: &str, quantity: i32) -> AppResult<()> {
        let order = self.editable(order_id).await?;
        let item = self.owned_item(&order, item_id).await?;
        let delta = quantity - item.quantity_ordered;

        self.items.update_quantity(&item.id_string(), quantity).await?;

        if order.status == OrderStatus::Pending && delta != 0 {
            let item_rid = item
                .id
                .clone()
                .ok_or_else(|| AppError::internal("Item record without id"))?;
            if delta < 0 {
                self.details.delete_tail(&item_rid, (-delta) as usize).await?;
            } else {
                self.top_up_ledger(&order, &item, quantity).await?;
            }
        }
        self.refresh_totals(&Self::rid(&order)?, order_id).await?;
        Ok(())
    }

    /// Cascade delete, DRAFT only
    pub async fn delete_draft(&self, order_id: &str) -> AppResult<()> {
        let order = self.orders.get(order_id).await?;
        if order.status != OrderStatus::Draft {
            return Err(AppError::business_rule(format!(
                "Only DRAFT orders can be deleted, order is {:?}",
                order.status
            )));
        }
        self.orders.delete_cascade(order_id).await?;
        info!(order_id, "Draft deleted");
        Ok(())
    }

    pub async fn cancel(&self, order_id: &str) -> AppResult<OrderStatusView> {
        let order = self.orders.get(order_id).await?;
        if !order.status.is_editable() {
            return Err(AppError::business_rule(format!(
                "Order cannot be cancelled from {:?}",
                order.status
            )));
        }
        self.orders.set_status(order_id, OrderStatus::Cancelled).await?;
        info!(order_id, "Order cancelled");
        self.get_status(order_id).await
    }

    // ========== Submission ==========

    /// DRAFT/PENDING → PENDING: materialize one ledger record per
    /// voucher unit. Idempotent: items that already carry their records
    /// are left untouched, so re-submitting only tops up what is missing.
    pub async fn submit(&self, order_id: &str) -> AppResult<OrderStatusView> {
        let order = self.orders.get(order_id).await?;
        if !order.status.is_editable() {
            return Err(AppError::business_rule(format!(
                "Order cannot be submitted from {:?}",
                order.status
            )));
        }
        let order_rid = Self::rid(&order)?;
        let items = self.items.find_by_order(&order_rid).await?;
        if items.is_empty() {
            return Err(AppError::validation("Cannot submit an order without items"));
        }

        for item in &items {
            self.top_up_ledger(&order, item, item.quantity_ordered)
                .await?;
        }
        self.refresh_totals(&order_rid, order_id).await?;
        if order.status == OrderStatus::Draft {
            self.orders.set_status(order_id, OrderStatus::Pending).await?;
        }
        info!(order_id, order_number = %order.order_number, "Order submitted");
        self.get_status(order_id).await
    }

    // ========== Reconcile / Confirm / Retry ==========

    /// Standalone balance check: refreshes pricing, reports sufficiency,
    /// spends nothing
    pub async fn reconcile(&self, order_id: &str) -> AppResult<ReconcileReport> {
        let order = self.orders.get(order_id).await?;
        let credentials = self.credentials(&order).await?;
        let outcome = self.reconciler.reconcile(&order, &credentials).await?;
        Ok(outcome.report(&order.currency))
    }

    /// The whole purchase pass: reconcile, execute every unresolved
    /// ledger record, roll up counters into a terminal status, then
    /// hand generated codes to the storefront.
    pub async fn confirm(&self, order_id: &str) -> AppResult<OrderStatusView> {
        let _guard = self.lock_order(order_id)?;

        let order = self.orders.get(order_id).await?;
        let resumable_failure = order.status == OrderStatus::Failed
            && order.failure_kind == Some(FailureKind::Funding);
        match order.status {
            OrderStatus::Draft | OrderStatus::Pending | OrderStatus::Processing => {}
            OrderStatus::Failed if resumable_failure => {}
            status => {
                return Err(AppError::business_rule(format!(
                    "Order cannot be confirmed from {status:?}"
                )));
            }
        }

        if order.status == OrderStatus::Draft {
            self.submit(order_id).await?;
        }
        let order = self.orders.get(order_id).await?;
        let credentials = self.credentials(&order).await?;

        // Reconcile faults are order-level: leave a trace on the order
        // before handing the error to the caller
        let outcome = match self.reconciler.reconcile(&order, &credentials).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order_id, error = %e, "Reconciliation failed");
                self.orders
                    .set_error_message(order_id, e.to_string())
                    .await?;
                return Err(e);
            }
        };
        if !outcome.sufficient {
            let message = AppError::InsufficientBalance {
                required: format!("{} {}", outcome.required, order.currency),
                available: format!("{} {}", outcome.available, order.currency),
            }
            .to_string();
            warn!(order_id, %message, "Confirm aborted before spending");
            self.orders
                .mark_failed(order_id, FailureKind::Funding, message)
                .await?;
            return self.get_status(order_id).await;
        }

        self.orders
            .mark_processing(order_id, outcome.session.balance)
            .await?;

        self.run_batch(order_id, &outcome.session, false).await?;

        let balance_after = self.balance_snapshot(&credentials).await;
        self.finalize_from_ledger(order_id, balance_after).await?;
        self.attach_generated(order_id).await;
        self.get_status(order_id).await
    }

    /// Re-attempt every FAILED ledger record still under the retry cap,
    /// with the same external ids. No-op when nothing is retryable.
    /// Refreshes the counters but never the order status: re-deriving
    /// a terminal status from the refreshed counts is the caller's call.
    pub async fn retry_failed(&self, order_id: &str) -> AppResult<OrderStatusView> {
        let _guard = self.lock_order(order_id)?;

        let order = self.orders.get(order_id).await?;
        let order_rid = Self::rid(&order)?;
        let retryable = self
            .details
            .find_failed_retryable(&order_rid, self.config.retry_cap)
            .await?;
        if retryable.is_empty() {
            info!(order_id, "No retryable failures, leaving order untouched");
            return Ok(order.to_view());
        }

        let credentials = self.credentials(&order).await?;
        let session = self.provider.authenticate(&credentials).await?;

        self.run_batch(order_id, &session, true).await?;

        let (generated, failed) = self.ledger_counts(&order_rid).await?;
        self.orders.update_counts(order_id, generated, failed).await?;
        info!(order_id, generated, failed, "Retry pass finished");
        self.attach_generated(order_id).await;
        self.get_status(order_id).await
    }

    pub async fn get_status(&self, order_id: &str) -> AppResult<OrderStatusView> {
        Ok(self.orders.get(order_id).await?.to_view())
    }

    // ========== Internals ==========

    fn lock_order(&self, order_id: &str) -> AppResult<FlightGuard<'_>> {
        if !self.in_flight.insert(order_id.to_string()) {
            return Err(AppError::conflict(format!(
                "Order {order_id} is already being processed"
            )));
        }
        Ok(FlightGuard {
            set: &self.in_flight,
            key: order_id.to_string(),
        })
    }

    fn rid(order: &PurchaseOrder) -> AppResult<RecordId> {
        order
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Order record without id"))
    }

    async fn editable(&self, order_id: &str) -> AppResult<PurchaseOrder> {
        let order = self.orders.get(order_id).await?;
        if !order.status.is_editable() {
            return Err(AppError::business_rule(format!(
                "Order is not editable in {:?}",
                order.status
            )));
        }
        Ok(order)
    }

    async fn owned_item(&self, order: &PurchaseOrder, item_id: &str) -> AppResult<PurchaseItem> {
        let item = self.items.get(item_id).await?;
        if Some(&item.order_id) != order.id.as_ref() {
            return Err(AppError::validation(format!(
                "Item {item_id} does not belong to order {}",
                order.id_string()
            )));
        }
        Ok(item)
    }

    async fn credentials(&self, order: &PurchaseOrder) -> AppResult<ProviderCredentials> {
        let profile = self.stores.get(&order.store_key).await?;
        Ok(ProviderCredentials {
            username: profile.provider_username,
            password: profile.provider_password,
            terminal_key: profile.terminal_key,
        })
    }

    /// Bring an item's ledger up to `target` records, creating only the
    /// missing tail
    async fn top_up_ledger(
        &self,
        order: &PurchaseOrder,
        item: &PurchaseItem,
        target: i32,
    ) -> AppResult<()> {
        let item_rid = item
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Item record without id"))?;
        let existing = self.details.find_by_item(&item_rid).await?.len() as i32;
        self.materialize_ledger(order, item, target - existing).await
    }

    /// Create `count` ledger records for an item, drawing sequence
    /// numbers from the order's monotonic counter so external ids stay
    /// globally unique across edits
    async fn materialize_ledger(
        &self,
        order: &PurchaseOrder,
        item: &PurchaseItem,
        count: i32,
    ) -> AppResult<()> {
        if count <= 0 {
            return Ok(());
        }
        let order_id = order.id_string();
        let first = self.orders.allocate_sequences(&order_id, count).await?;
        let order_rid = Self::rid(order)?;
        let item_rid = item
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Item record without id"))?;

        let rows: Vec<VoucherDetailCreate> = (0..count)
            .map(|offset| {
                let sequence = first + offset;
                VoucherDetailCreate::new(
                    order_rid.clone(),
                    item_rid.clone(),
                    format!("{}-{}-{:03}", order.order_number, item.option_code, sequence),
                    sequence,
                )
            })
            .collect();
        self.details.create_batch(rows).await?;
        Ok(())
    }

    async fn refresh_totals(&self, order_rid: &RecordId, order_id: &str) -> AppResult<()> {
        let items = self.items.find_by_order(order_rid).await?;
        let total: Decimal = items.iter().map(|i| i.total_wholesale_cost).sum();
        let ordered: i32 = items.iter().map(|i| i.quantity_ordered).sum();
        self.orders.set_totals(order_id, total, ordered).await?;
        Ok(())
    }

    /// Execute every unresolved (or, for retries, retryable-FAILED)
    /// ledger record in sequence order. Transport faults are recorded
    /// and skipped; the rest of the batch still runs. Order-level
    /// faults stop the batch with the order left PROCESSING.
    async fn run_batch(
        &self,
        order_id: &str,
        session: &ProviderSession,
        retry_only: bool,
    ) -> AppResult<()> {
        let order = self.orders.get(order_id).await?;
        let order_rid = Self::rid(&order)?;

        let targets: Vec<VoucherDetail> = if retry_only {
            self.details
                .find_failed_retryable(&order_rid, self.config.retry_cap)
                .await?
        } else {
            self.details
                .find_by_order(&order_rid)
                .await?
                .into_iter()
                .filter(|d| !d.status.is_resolved())
                .collect()
        };

        let items = self.items.find_by_order(&order_rid).await?;
        let items_by_id: HashMap<String, &PurchaseItem> = items
            .iter()
            .map(|item| (item.id_string(), item))
            .collect();

        let mut pacer = Pacer::new(
            self.config.pacer_window,
            Duration::from_millis(self.config.pacer_pause_ms),
        );

        for detail in &targets {
            let item = match items_by_id.get(&detail.item_id.to_string()) {
                Some(item) => *item,
                None => {
                    // Orphan ledger record; skip rather than poison the batch
                    error!(external_id = %detail.external_id, "Ledger record without item");
                    continue;
                }
            };
            match self.executor.execute(session, detail, item).await {
                Ok(ExecutionOutcome::Generated) => pacer.on_success().await,
                Ok(ExecutionOutcome::Rejected) => {}
                Err(e) if e.is_transport() => {
                    // Already durably recorded in the ledger; the batch
                    // moves on to the next unit
                }
                Err(e) => {
                    error!(order_id, error = %e, "Batch aborted by order-level failure");
                    self.orders
                        .set_error_message(order_id, e.to_string())
                        .await?;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn balance_snapshot(&self, credentials: &ProviderCredentials) -> Option<Decimal> {
        match self.provider.authenticate(credentials).await {
            Ok(session) => Some(session.balance),
            Err(e) => {
                warn!(error = %e, "Balance re-read failed, leaving balance_after empty");
                None
            }
        }
    }

    async fn ledger_counts(&self, order_rid: &RecordId) -> AppResult<(i32, i32)> {
        let generated = self
            .details
            .count_by_status(order_rid, VoucherStatus::Generated)
            .await? as i32;
        let failed = self
            .details
            .count_by_status(order_rid, VoucherStatus::Failed)
            .await? as i32;
        Ok((generated, failed))
    }

    /// Roll the ledger statuses up into counters and a terminal status,
    /// set in one write
    async fn finalize_from_ledger(
        &self,
        order_id: &str,
        balance_after: Option<Decimal>,
    ) -> AppResult<()> {
        let order = self.orders.get(order_id).await?;
        let order_rid = Self::rid(&order)?;
        let (generated, failed) = self.ledger_counts(&order_rid).await?;

        let (status, failure_kind, error_message, success_message) = if failed == 0 {
            (
                OrderStatus::Completed,
                None,
                None,
                Some(format!("All {generated} vouchers generated")),
            )
        } else if generated == 0 {
            (
                OrderStatus::Failed,
                Some(FailureKind::Processing),
                Some(format!("All {failed} voucher transactions failed")),
                None,
            )
        } else {
            (
                OrderStatus::PartiallyCompleted,
                None,
                Some(format!("{failed} of {} vouchers failed", generated + failed)),
                None,
            )
        };

        info!(
            order_id,
            ?status,
            generated,
            failed,
            "Purchase pass finished"
        );
        self.orders
            .finalize(
                order_id,
                status,
                generated,
                failed,
                balance_after,
                failure_kind,
                error_message,
                success_message,
            )
            .await?;
        Ok(())
    }

    /// Hand generated, not-yet-synced codes to the storefront, grouped
    /// by destination product. Failures are logged and never revert
    /// voucher status: the money is spent and the codes must not be
    /// reissued.
    async fn attach_generated(&self, order_id: &str) {
        if let Err(e) = self.try_attach_generated(order_id).await {
            warn!(order_id, error = %e, "Attachment pass failed, codes stay unsynced");
        }
    }

    async fn try_attach_generated(&self, order_id: &str) -> AppResult<()> {
        let order = self.orders.get(order_id).await?;
        let order_rid = Self::rid(&order)?;
        let generated = self
            .details
            .find_by_order_and_status(&order_rid, VoucherStatus::Generated)
            .await?;
        let items = self.items.find_by_order(&order_rid).await?;
        let items_by_id: HashMap<String, &PurchaseItem> = items
            .iter()
            .map(|item| (item.id_string(), item))
            .collect();

        // destination product -> (code, detail id, option code)
        let mut batches: HashMap<String, Vec<(String, String, String)>> = HashMap::new();
        for detail in &generated {
            if detail.wp_synced {
                continue;
            }
            let (Some(item), Some(code)) = (
                items_by_id.get(&detail.item_id.to_string()),
                detail.reference_code.clone(),
            ) else {
                continue;
            };
            batches
                .entry(item.destination_product_id.clone())
                .or_default()
                .push((code, detail.id_string(), item.option_code.clone()));
        }

        for (product_id, entries) in batches {
            let codes: Vec<String> = entries.iter().map(|(code, _, _)| code.clone()).collect();
            let results = self.notifier.attach_codes(&product_id, codes).await?;

            let mut stock_by_option: HashMap<String, i32> = HashMap::new();
            for result in results.into_iter().filter(|r| r.attached) {
                if let Some((_, detail_id, option_code)) =
                    entries.iter().find(|(code, _, _)| *code == result.code)
                {
                    self.details.mark_synced(detail_id).await?;
                    *stock_by_option.entry(option_code.clone()).or_default() += 1;
                }
            }
            for (option_code, count) in stock_by_option {
                self.catalog.increment_stock(&option_code, count).await?;
            }
            info!(order_id, product_id = %product_id, "Codes attached to storefront");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::mock::MockAttachmentNotifier;
    use crate::db::models::StoreProfile;
    use crate::provider::mock::{IssueScript, MockVoucherProvider};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            provider_base_url: "http://localhost:0".to_string(),
            provider_timeout_ms: 1_000,
            settlement_currency: "EUR".to_string(),
            pacer_window: 10,
            pacer_pause_ms: 0,
            retry_cap: 3,
        }
    }

    async fn setup(
        balance: Decimal,
    ) -> (
        Database,
        OrderOrchestrator,
        Arc<MockVoucherProvider>,
        Arc<MockAttachmentNotifier>,
    ) {
        let db = Database::open_in_memory().await.unwrap();
        let provider = Arc::new(MockVoucherProvider::new(balance));
        provider.set_price("GIFT-10", d("8.5"));
        let notifier = Arc::new(MockAttachmentNotifier::new());

        StoreProfileRepository::new(db.handle().clone())
            .upsert(StoreProfile {
                id: None,
                store_key: "store-1".to_string(),
                name: "Test Store".to_string(),
                provider_username: "merchant".to_string(),
                provider_password: "secret".to_string(),
                terminal_key: "terminal-1".to_string(),
            })
            .await
            .unwrap();

        let orchestrator = OrderOrchestrator::new(
            &db,
            provider.clone(),
            notifier.clone(),
            test_config(),
        );
        (db, orchestrator, provider, notifier)
    }

    fn gift_item(quantity: i32) -> PurchaseItemCreate {
        PurchaseItemCreate {
            voucher_type: "GIFTCARD".to_string(),
            provider_code: "PROV-GIFT".to_string(),
            option_code: "GIFT-10".to_string(),
            display_name: "Gift Card 10".to_string(),
            destination_product_id: "wp-101".to_string(),
            quantity_ordered: quantity,
            unit_face_value: d("10.00"),
            unit_wholesale_price: d("8.5"),
        }
    }

    /// Draft with one GIFT-10 line, submitted
    async fn submitted_order(orchestrator: &OrderOrchestrator, quantity: i32) -> OrderStatusView {
        let draft = orchestrator.create_draft("store-1", "user-1").await.unwrap();
        orchestrator
            .add_item(&draft.order_id, gift_item(quantity))
            .await
            .unwrap();
        orchestrator.submit(&draft.order_id).await.unwrap()
    }

    async fn ledger(db: &Database, order_id: &str) -> Vec<VoucherDetail> {
        let orders = PurchaseOrderRepository::new(db.handle().clone());
        let order = orders.get(order_id).await.unwrap();
        VoucherDetailRepository::new(db.handle().clone())
            .find_by_order(order.id.as_ref().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn happy_path_three_vouchers_completed() {
        let (db, orchestrator, provider, notifier) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 3).await;

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert_eq!(result.status, OrderStatus::Completed);
        assert_eq!(result.vouchers_ordered, 3);
        assert_eq!(result.vouchers_generated, 3);
        assert_eq!(result.vouchers_failed, 0);
        assert_eq!(result.balance_before, Some(d("1000")));
        assert_eq!(result.balance_after, Some(d("974.5")));
        assert!(result.success_message.is_some());
        assert!(result.processing_started_at.is_some());
        assert!(result.processing_completed_at.is_some());

        let details = ledger(&db, &order.order_id).await;
        assert_eq!(details.len(), 3);
        for detail in &details {
            assert_eq!(detail.status, VoucherStatus::Generated);
            assert!(detail.serial_number.is_some());
            assert!(detail.reference_code.is_some());
            assert!(detail.response_time_ms.is_some());
            assert!(detail.wp_synced);
        }
        assert_eq!(provider.issue_calls().len(), 3);
        assert_eq!(provider.balance(), d("974.5"));
        assert_eq!(notifier.attached().len(), 3);
        assert!(notifier.attached().iter().all(|(p, _)| p == "wp-101"));
    }

    #[tokio::test]
    async fn insufficient_balance_fails_before_any_issue_call() {
        let (db, orchestrator, provider, _) = setup(d("10")).await;
        let order = submitted_order(&orchestrator, 3).await;

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert_eq!(result.status, OrderStatus::Failed);
        assert_eq!(result.failure_kind, Some(FailureKind::Funding));
        let message = result.error_message.unwrap();
        assert!(message.contains("25.5"), "required amount missing: {message}");
        assert!(message.contains("10"), "available amount missing: {message}");
        assert!(provider.issue_calls().is_empty());
        assert!(ledger(&db, &order.order_id)
            .await
            .iter()
            .all(|detail| detail.status == VoucherStatus::Pending));
    }

    #[tokio::test]
    async fn funding_failure_recovers_after_topup() {
        let (_db, orchestrator, provider, _) = setup(d("10")).await;
        let order = submitted_order(&orchestrator, 3).await;
        orchestrator.confirm(&order.order_id).await.unwrap();

        provider.set_balance(d("1000"));
        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert_eq!(result.status, OrderStatus::Completed);
        assert_eq!(result.failure_kind, None);
        assert_eq!(result.error_message, None);
        assert_eq!(result.vouchers_generated, 3);
    }

    #[tokio::test]
    async fn business_failures_yield_partial_and_targeted_retry() {
        let (db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 5).await;
        let failing = [
            format!("{}-GIFT-10-002", order.order_number),
            format!("{}-GIFT-10-004", order.order_number),
        ];
        for id in &failing {
            provider.script_issue(id, IssueScript::Business("Out of stock".to_string()));
        }

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert_eq!(result.status, OrderStatus::PartiallyCompleted);
        assert_eq!(result.vouchers_generated, 3);
        assert_eq!(result.vouchers_failed, 2);
        let details = ledger(&db, &order.order_id).await;
        let failed: Vec<_> = details
            .iter()
            .filter(|detail| detail.status == VoucherStatus::Failed)
            .collect();
        assert_eq!(failed.len(), 2);
        for detail in &failed {
            assert!(failing.contains(&detail.external_id));
            assert_eq!(detail.retry_count, 0);
            assert_eq!(detail.error_message.as_deref(), Some("Out of stock"));
        }

        // Stock came back; retry touches exactly the two failed units
        for id in &failing {
            provider.script_issue(id, IssueScript::Generated);
        }
        let calls_before = provider.issue_calls().len();
        let retried = orchestrator.retry_failed(&order.order_id).await.unwrap();

        // Counters refresh; the status stays as confirm left it and the
        // caller re-derives a terminal state from the counts
        assert_eq!(retried.status, OrderStatus::PartiallyCompleted);
        assert_eq!(retried.vouchers_generated, 5);
        assert_eq!(retried.vouchers_failed, 0);
        let retry_calls: Vec<String> = provider.issue_calls()[calls_before..]
            .iter()
            .map(|call| call.external_id.clone())
            .collect();
        assert_eq!(retry_calls.len(), 2);
        assert!(retry_calls.iter().all(|id| failing.contains(id)));
    }

    #[tokio::test]
    async fn transport_failures_increment_retry_count() {
        let (db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        for sequence in 1..=2 {
            provider.script_issue(
                &format!("{}-GIFT-10-{:03}", order.order_number, sequence),
                IssueScript::Transport("connection timed out".to_string()),
            );
        }

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert_eq!(result.status, OrderStatus::Failed);
        assert_eq!(result.failure_kind, Some(FailureKind::Processing));
        assert_eq!(result.vouchers_failed, 2);
        let details = ledger(&db, &order.order_id).await;
        let first_ids: Vec<String> = details.iter().map(|d| d.external_id.clone()).collect();
        for detail in &details {
            assert_eq!(detail.status, VoucherStatus::Failed);
            assert_eq!(detail.retry_count, 1);
        }

        // Same external ids on retry, counter advances again
        let calls_before = provider.issue_calls().len();
        orchestrator.retry_failed(&order.order_id).await.unwrap();
        let retry_ids: Vec<String> = provider.issue_calls()[calls_before..]
            .iter()
            .map(|call| call.external_id.clone())
            .collect();
        assert_eq!(retry_ids, first_ids);
        for detail in ledger(&db, &order.order_id).await {
            assert_eq!(detail.retry_count, 2);
        }
    }

    #[tokio::test]
    async fn retry_cap_exhausts_automatic_retries() {
        let (db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 1).await;
        provider.script_issue(
            &format!("{}-GIFT-10-001", order.order_number),
            IssueScript::Transport("connection timed out".to_string()),
        );

        orchestrator.confirm(&order.order_id).await.unwrap();
        orchestrator.retry_failed(&order.order_id).await.unwrap();
        orchestrator.retry_failed(&order.order_id).await.unwrap();
        assert_eq!(ledger(&db, &order.order_id).await[0].retry_count, 3);

        // Cap reached: nothing left to retry
        let calls_before = provider.issue_calls().len();
        let result = orchestrator.retry_failed(&order.order_id).await.unwrap();
        assert_eq!(result.status, OrderStatus::Failed);
        assert_eq!(provider.issue_calls().len(), calls_before);
    }

    #[tokio::test]
    async fn retry_failed_is_a_noop_without_failures() {
        let (_db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        let confirmed = orchestrator.confirm(&order.order_id).await.unwrap();

        let calls_before = provider.issue_calls().len();
        let result = orchestrator.retry_failed(&order.order_id).await.unwrap();

        assert_eq!(result, confirmed);
        assert_eq!(provider.issue_calls().len(), calls_before);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_on_stable_prices() {
        let (_db, orchestrator, _, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 4).await;

        let first = orchestrator.reconcile(&order.order_id).await.unwrap();
        let second = orchestrator.reconcile(&order.order_id).await.unwrap();

        assert_eq!(first.required, second.required);
        assert_eq!(first.required, d("34.0000"));
        assert!(first.sufficient && second.sufficient);
    }

    #[tokio::test]
    async fn reconcile_refreshes_drifted_price() {
        let (_db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;

        provider.set_price("GIFT-10", d("9.25"));
        let report = orchestrator.reconcile(&order.order_id).await.unwrap();

        assert_eq!(report.required, d("18.5000"));
        let status = orchestrator.get_status(&order.order_id).await.unwrap();
        assert_eq!(status.total_wholesale_cost, d("18.5000"));
    }

    #[tokio::test]
    async fn external_ids_stay_unique_across_resize() {
        let (db, orchestrator, _, _) = setup(d("1000")).await;
        let draft = orchestrator.create_draft("store-1", "user-1").await.unwrap();
        let item_id = orchestrator
            .add_item(&draft.order_id, gift_item(3))
            .await
            .unwrap();
        orchestrator.submit(&draft.order_id).await.unwrap();

        orchestrator
            .resize_item(&draft.order_id, &item_id, 1)
            .await
            .unwrap();
        orchestrator
            .resize_item(&draft.order_id, &item_id, 3)
            .await
            .unwrap();

        let details = ledger(&db, &draft.order_id).await;
        assert_eq!(details.len(), 3);
        let sequences: Vec<i32> = details.iter().map(|d| d.sequence).collect();
        assert_eq!(sequences, vec![1, 4, 5]);
        let mut external_ids: Vec<String> =
            details.iter().map(|d| d.external_id.clone()).collect();
        external_ids.dedup();
        assert_eq!(external_ids.len(), 3);

        let status = orchestrator.get_status(&draft.order_id).await.unwrap();
        assert_eq!(status.vouchers_ordered, 3);
    }

    #[tokio::test]
    async fn resubmit_tops_up_without_duplicating_ledger() {
        let (db, orchestrator, _, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 3).await;

        let again = orchestrator.submit(&order.order_id).await.unwrap();

        assert_eq!(again.status, OrderStatus::Pending);
        assert_eq!(again.vouchers_ordered, 3);
        let details = ledger(&db, &order.order_id).await;
        assert_eq!(details.len(), 3);
        let sequences: Vec<i32> = details.iter().map(|d| d.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn auth_failure_attaches_error_and_aborts_confirm() {
        let (_db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        provider.fail_auth(true);

        let err = orchestrator.confirm(&order.order_id).await.unwrap_err();

        assert!(matches!(err, AppError::ProviderAuth { .. }));
        assert_eq!(provider.auth_calls(), 1);
        assert!(provider.issue_calls().is_empty());
        // The order keeps its resumable state, with the cause attached
        let status = orchestrator.get_status(&order.order_id).await.unwrap();
        assert_eq!(status.status, OrderStatus::Pending);
        assert!(status
            .error_message
            .unwrap()
            .contains("authentication failed"));
    }

    #[tokio::test]
    async fn rejected_code_stays_unsynced_for_a_later_pass() {
        let (db, orchestrator, _, notifier) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        notifier.reject_code(&format!("REF-{}-GIFT-10-001", order.order_number));

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        // A per-code storefront rejection never touches voucher status;
        // the unsynced record waits for the next attachment pass
        assert_eq!(result.status, OrderStatus::Completed);
        assert_eq!(notifier.attached().len(), 1);
        let details = ledger(&db, &order.order_id).await;
        let synced: Vec<bool> = details.iter().map(|d| d.wp_synced).collect();
        assert_eq!(synced, vec![false, true]);
        assert!(details.iter().all(|d| d.status == VoucherStatus::Generated));
        let catalog = CatalogPriceRepository::new(db.handle().clone());
        assert_eq!(
            catalog.find_by_option("GIFT-10").await.unwrap().unwrap().stock_quantity,
            1
        );
    }

    #[tokio::test]
    async fn submit_rejects_an_empty_order() {
        let (_db, orchestrator, _, _) = setup(d("1000")).await;
        let draft = orchestrator.create_draft("store-1", "user-1").await.unwrap();

        let err = orchestrator.submit(&draft.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let status = orchestrator.get_status(&draft.order_id).await.unwrap();
        assert_eq!(status.status, OrderStatus::Draft);
    }

    #[tokio::test]
    async fn add_item_rejects_zero_quantity() {
        let (_db, orchestrator, _, _) = setup(d("1000")).await;
        let draft = orchestrator.create_draft("store-1", "user-1").await.unwrap();

        let err = orchestrator
            .add_item(&draft.order_id, gift_item(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn items_are_frozen_while_processing() {
        let (db, orchestrator, _, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        PurchaseOrderRepository::new(db.handle().clone())
            .set_status(&order.order_id, OrderStatus::Processing)
            .await
            .unwrap();

        let err = orchestrator
            .add_item(&order.order_id, gift_item(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule { .. }));
        assert_eq!(ledger(&db, &order.order_id).await.len(), 2);
    }

    #[tokio::test]
    async fn confirm_rejected_on_terminal_order() {
        let (_db, orchestrator, _, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 1).await;
        orchestrator.confirm(&order.order_id).await.unwrap();

        let err = orchestrator.confirm(&order.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule { .. }));
    }

    #[tokio::test]
    async fn cancel_only_from_editable_states() {
        let (_db, orchestrator, _, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 1).await;

        let cancelled = orchestrator.cancel(&order.order_id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let err = orchestrator.cancel(&order.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule { .. }));
    }

    #[tokio::test]
    async fn delete_draft_cascades_and_rejects_submitted() {
        let (db, orchestrator, _, _) = setup(d("1000")).await;
        let draft = orchestrator.create_draft("store-1", "user-1").await.unwrap();
        orchestrator
            .add_item(&draft.order_id, gift_item(2))
            .await
            .unwrap();
        orchestrator.delete_draft(&draft.order_id).await.unwrap();
        assert!(matches!(
            orchestrator.get_status(&draft.order_id).await.unwrap_err(),
            AppError::NotFound { .. }
        ));

        let submitted = submitted_order(&orchestrator, 1).await;
        let err = orchestrator.delete_draft(&submitted.order_id).await.unwrap_err();
        assert!(matches!(err, AppError::BusinessRule { .. }));
        let items = PurchaseItemRepository::new(db.handle().clone());
        let order = PurchaseOrderRepository::new(db.handle().clone())
            .get(&submitted.order_id)
            .await
            .unwrap();
        assert_eq!(
            items.find_by_order(order.id.as_ref().unwrap()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn counters_balance_at_terminal_status() {
        let (_db, orchestrator, provider, _) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 4).await;
        provider.script_issue(
            &format!("{}-GIFT-10-003", order.order_number),
            IssueScript::Business("Limit reached".to_string()),
        );

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        assert!(result.status.is_terminal());
        assert_eq!(
            result.vouchers_generated + result.vouchers_failed,
            result.vouchers_ordered
        );
    }

    #[tokio::test]
    async fn attachment_failure_keeps_vouchers_generated() {
        let (db, orchestrator, _, notifier) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 2).await;
        notifier.fail_all(true);

        let result = orchestrator.confirm(&order.order_id).await.unwrap();

        // Money spent, codes exist; attachment failure must not regress
        assert_eq!(result.status, OrderStatus::Completed);
        for detail in ledger(&db, &order.order_id).await {
            assert_eq!(detail.status, VoucherStatus::Generated);
            assert!(!detail.wp_synced);
        }

        // Retry path re-runs attachment once the storefront is back
        notifier.fail_all(false);
        orchestrator.retry_failed(&order.order_id).await.unwrap();
        // No failures to retry, so attachment stays pending until the
        // next pass that reaches it
        assert_eq!(notifier.attached().len(), 0);
    }

    #[tokio::test]
    async fn stock_increments_only_for_newly_attached_codes() {
        let (db, orchestrator, provider, notifier) = setup(d("1000")).await;
        let order = submitted_order(&orchestrator, 3).await;
        let failing = format!("{}-GIFT-10-002", order.order_number);
        provider.script_issue(&failing, IssueScript::Business("Out of stock".to_string()));

        orchestrator.confirm(&order.order_id).await.unwrap();
        assert_eq!(notifier.attached().len(), 2);
        let catalog = CatalogPriceRepository::new(db.handle().clone());
        assert_eq!(
            catalog.find_by_option("GIFT-10").await.unwrap().unwrap().stock_quantity,
            2
        );

        provider.script_issue(&failing, IssueScript::Generated);
        orchestrator.retry_failed(&order.order_id).await.unwrap();

        // Only the newly generated third code attaches and counts
        assert_eq!(notifier.attached().len(), 3);
        assert_eq!(
            catalog.find_by_option("GIFT-10").await.unwrap().unwrap().stock_quantity,
            3
        );
    }
}
