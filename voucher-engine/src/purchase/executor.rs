//! Per-voucher upstream transaction
//!
//! One executor call is one idempotency-keyed IssueVoucher round-trip
//! for one ledger record: mark PROCESSING, call upstream, persist the
//! verdict. A transport fault is written to the ledger (retry counter
//! advances) before the error reaches the caller; a provider refusal
//! comes back as `Ok(Rejected)` with the retry counter untouched.

use crate::db::models::{PurchaseItem, VoucherDetail};
use crate::db::repository::voucher_detail::GeneratedFields;
use crate::db::repository::VoucherDetailRepository;
use crate::provider::{IssueRequest, ProviderSession, VoucherProvider};
use shared::purchase::VoucherStatus;
use shared::util::now_millis;
use shared::{AppError, AppResult};
use std::sync::Arc;
use surrealdb::engine::local::Db;
use surrealdb::Surreal;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Provider issued the voucher
    Generated,
    /// Provider refused (business failure); not auto-retried
    Rejected,
}

#[derive(Clone)]
pub struct TransactionExecutor {
    details: VoucherDetailRepository,
    provider: Arc<dyn VoucherProvider>,
    retry_cap: u32,
}

impl TransactionExecutor {
    pub fn new(db: Surreal<Db>, provider: Arc<dyn VoucherProvider>, retry_cap: u32) -> Self {
        Self {
            details: VoucherDetailRepository::new(db),
            provider,
            retry_cap,
        }
    }

    /// Execute one ledger record against the provider.
    ///
    /// Preconditions: the record is PENDING, or FAILED with retries
    /// left. A PROCESSING record is also accepted so an interrupted
    /// batch can resume; the external id keeps the re-send idempotent.
    pub async fn execute(
        &self,
        session: &ProviderSession,
        detail: &VoucherDetail,
        item: &PurchaseItem,
    ) -> AppResult<ExecutionOutcome> {
        match detail.status {
            VoucherStatus::Pending | VoucherStatus::Processing => {}
            VoucherStatus::Failed => {
                if detail.retry_count >= self.retry_cap as i32 {
                    return Err(AppError::business_rule(format!(
                        "Voucher {} exhausted its {} retries",
                        detail.external_id, self.retry_cap
                    )));
                }
            }
            VoucherStatus::Generated => {
                return Err(AppError::business_rule(format!(
                    "Voucher {} is already generated",
                    detail.external_id
                )));
            }
        }

        let detail_id = detail.id_string();
        let sent_at = now_millis();
        self.details.mark_processing(&detail_id, sent_at).await?;

        let request = IssueRequest::single(
            detail.external_id.clone(),
            item.option_code.clone(),
            item.unit_face_value,
        );
        let result = self.provider.issue_voucher(session, &request).await;
        let received_at = now_millis();
        let elapsed = received_at - sent_at;

        match result {
            Err(e) if e.is_transport() => {
                warn!(
                    external_id = %detail.external_id,
                    error = %e,
                    "Transport failure issuing voucher"
                );
                self.details
                    .mark_failed_transport(&detail_id, e.to_string(), received_at, elapsed)
                    .await?;
                Err(e)
            }
            // Auth/internal faults are order-level; the ledger record
            // stays PROCESSING and the resumed batch picks it up again
            Err(e) => Err(e),
            Ok(outcome) => {
                if outcome.succeeded {
                    let issued = match outcome.result {
                        Some(issued) => issued,
                        None => {
                            let e = AppError::provider_transport(format!(
                                "{}: success verdict without a voucher payload",
                                detail.external_id
                            ));
                            self.details
                                .mark_failed_transport(
                                    &detail_id,
                                    e.to_string(),
                                    received_at,
                                    elapsed,
                                )
                                .await?;
                            return Err(e);
                        }
                    };
                    info!(
                        external_id = %detail.external_id,
                        serial = %issued.serial_number,
                        elapsed_ms = elapsed,
                        "Voucher generated"
                    );
                    self.details
                        .mark_generated(
                            &detail_id,
                            GeneratedFields {
                                serial_number: issued.serial_number,
                                reference_code: issued.reference,
                                redeem_url: issued.redeem_url,
                                transaction_id: issued.transaction_id,
                                provider_transaction_id: issued.provider_transaction_id,
                                settled_amount: issued.settled_amount,
                            },
                            received_at,
                            elapsed,
                        )
                        .await?;
                    Ok(ExecutionOutcome::Generated)
                } else {
                    let message = outcome
                        .error_message
                        .unwrap_or_else(|| "Provider refused without a reason".to_string());
                    warn!(
                        external_id = %detail.external_id,
                        error = %message,
                        "Provider refused voucher"
                    );
                    self.details
                        .mark_failed_business(&detail_id, message, received_at, elapsed)
                        .await?;
                    Ok(ExecutionOutcome::Rejected)
                }
            }
        }
    }
}
