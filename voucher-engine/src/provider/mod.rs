//! Upstream voucher provider interface
//!
//! The provider distinguishes two failure flavors and so do we:
//! transport faults (timeouts, 5xx, broken auth) surface as `Err` and
//! are retryable; provider-reported refusals (out of stock, limits)
//! come back as `Ok` with `succeeded = false` and are not auto-retried.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::AppResult;

pub use http::HttpVoucherProvider;

/// Credentials loaded from the store profile
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub username: String,
    pub password: String,
    pub terminal_key: String,
}

/// Short-lived authenticated session: a token plus the balance snapshot
/// taken at authentication time. Obtained once per confirm and threaded
/// through the batch explicitly.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub token: String,
    pub balance: Decimal,
}

/// Current pricing window for one voucher option
#[derive(Debug, Clone, Deserialize)]
pub struct OptionPricing {
    pub min_face_value: Decimal,
    pub max_face_value: Decimal,
    pub min_wholesale_value: Decimal,
    pub max_wholesale_value: Decimal,
    pub currency_code: String,
}

impl OptionPricing {
    /// The wholesale price a single unit will settle at. The provider
    /// quotes a window; bulk purchases settle at the minimum.
    pub fn current_wholesale(&self) -> Decimal {
        self.min_wholesale_value
    }
}

/// One voucher unit issue request, keyed by the external id
#[derive(Debug, Clone, Serialize)]
pub struct IssueRequest {
    pub external_id: String,
    pub option_code: String,
    pub face_amount: Decimal,
    pub quantity: i32,
}

impl IssueRequest {
    pub fn single(external_id: String, option_code: String, face_amount: Decimal) -> Self {
        Self {
            external_id,
            option_code,
            face_amount,
            quantity: 1,
        }
    }
}

/// Payload of a successfully issued voucher
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedVoucher {
    pub serial_number: String,
    pub reference: String,
    pub redeem_url: Option<String>,
    pub settled_amount: Decimal,
    pub wholesale_amount: Decimal,
    pub transaction_id: String,
    pub provider_transaction_id: String,
}

/// Provider verdict for one issue call that reached the provider
#[derive(Debug, Clone, Deserialize)]
pub struct IssueOutcome {
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub result: Option<IssuedVoucher>,
}

#[async_trait]
pub trait VoucherProvider: Send + Sync {
    /// Authenticate and snapshot the account balance
    async fn authenticate(&self, credentials: &ProviderCredentials) -> AppResult<ProviderSession>;

    /// Current pricing window for an option
    async fn option_pricing(
        &self,
        session: &ProviderSession,
        option_code: &str,
    ) -> AppResult<OptionPricing>;

    /// Issue one voucher unit. `Err` means the request did not get a
    /// provider verdict (transport); `Ok` carries the verdict either way.
    async fn issue_voucher(
        &self,
        session: &ProviderSession,
        request: &IssueRequest,
    ) -> AppResult<IssueOutcome>;
}
