//! Balance and pricing reconciliation
//!
//! Upstream pricing is volatile, so immediately before spending money
//! the engine re-reads the account balance and the current wholesale
//! price of every option on the order, overwrites item pricing, and
//! decides sufficiency. The comparison runs in minor units; the
//! threshold case never depends on decimal representation.

use crate::db::models::PurchaseOrder;
use crate::db::repository::{
    CatalogPriceRepository, PurchaseItemRepository, PurchaseOrderRepository,
};
use crate::provider::{ProviderCredentials, ProviderSession, VoucherProvider};
use rust_decimal::Decimal;
use shared::money;
use shared::purchase::{FailureKind, OrderStatus};
use shared::AppResult;
use std::sync::Arc;
use surrealdb::engine::local::Db;
use surrealdb::Surreal;
use tracing::{info, warn};

/// Full reconciliation result, session included so `confirm` can run
/// the batch without a second authentication round-trip
pub struct ReconcileOutcome {
    pub sufficient: bool,
    pub required: Decimal,
    pub available: Decimal,
    pub required_minor: i64,
    pub available_minor: i64,
    pub session: ProviderSession,
}

impl ReconcileOutcome {
    pub fn report(&self, currency: &str) -> ReconcileReport {
        ReconcileReport {
            sufficient: self.sufficient,
            required: self.required,
            available: self.available,
            currency: currency.to_string(),
        }
    }
}

/// Caller-facing view of a standalone balance check
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReconcileReport {
    pub sufficient: bool,
    pub required: Decimal,
    pub available: Decimal,
    pub currency: String,
}

#[derive(Clone)]
pub struct BalanceReconciler {
    orders: PurchaseOrderRepository,
    items: PurchaseItemRepository,
    catalog: CatalogPriceRepository,
    provider: Arc<dyn VoucherProvider>,
}

impl BalanceReconciler {
    pub fn new(db: Surreal<Db>, provider: Arc<dyn VoucherProvider>) -> Self {
        Self {
            orders: PurchaseOrderRepository::new(db.clone()),
            items: PurchaseItemRepository::new(db.clone()),
            catalog: CatalogPriceRepository::new(db),
            provider,
        }
    }

    /// Refresh pricing from upstream, persist it, and decide whether
    /// the balance covers the order. A FAILED(funding) order that is
    /// now covered goes back to PENDING.
    pub async fn reconcile(
        &self,
        order: &PurchaseOrder,
        credentials: &ProviderCredentials,
    ) -> AppResult<ReconcileOutcome> {
        let session = self.provider.authenticate(credentials).await?;
        let order_id = order.id_string();
        let order_rid = order
            .id
            .as_ref()
            .ok_or_else(|| shared::AppError::internal("Order record without id"))?;

        let items = self.items.find_by_order(order_rid).await?;

        let mut total = Decimal::ZERO;
        let mut ordered = 0i32;
        for item in &items {
            let pricing = self
                .provider
                .option_pricing(&session, &item.option_code)
                .await?;
            let price = money::round_wholesale(pricing.current_wholesale());
            let item_id = item.id_string();

            if price != item.unit_wholesale_price {
                info!(
                    order_id = %order_id,
                    option = %item.option_code,
                    old = %item.unit_wholesale_price,
                    new = %price,
                    "Wholesale price drifted, updating item"
                );
            }
            let updated = self
                .items
                .update_pricing(&item_id, price)
                .await
                .map_err(shared::AppError::from)?;
            total += updated.total_wholesale_cost;
            ordered += updated.quantity_ordered;

            // Cost-basis store is best effort; a write failure must not
            // block the purchase
            if let Err(e) = self
                .catalog
                .upsert_price(&item.option_code, price, &pricing.currency_code)
                .await
            {
                warn!(option = %item.option_code, error = %e, "Catalog price write failed");
            }
        }

        self.orders
            .set_totals(&order_id, total, ordered)
            .await
            .map_err(shared::AppError::from)?;

        let required_minor = money::to_minor_units(total);
        let available_minor = money::to_minor_units(session.balance);
        let sufficient = available_minor >= required_minor;

        if sufficient
            && order.status == OrderStatus::Failed
            && order.failure_kind == Some(FailureKind::Funding)
        {
            info!(order_id = %order_id, "Funding failure cleared, order back to PENDING");
            self.orders
                .reset_funding_failure(&order_id)
                .await
                .map_err(shared::AppError::from)?;
        }

        info!(
            order_id = %order_id,
            required_minor,
            available_minor,
            sufficient,
            "Reconciliation complete"
        );

        Ok(ReconcileOutcome {
            sufficient,
            required: total,
            available: session.balance,
            required_minor,
            available_minor,
            session,
        })
    }
}
