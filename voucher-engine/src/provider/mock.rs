//! Scripted in-memory provider for tests

use super::{
    IssueOutcome, IssueRequest, IssuedVoucher, OptionPricing, ProviderCredentials,
    ProviderSession, VoucherProvider,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// What the mock should do when a given external id is issued
#[derive(Debug, Clone)]
pub enum IssueScript {
    /// Issue normally, settling at the option's wholesale price
    Generated,
    /// Provider verdict: refused (succeeded = false)
    Business(String),
    /// No verdict: the call errors out at the transport level
    Transport(String),
}

#[derive(Default)]
struct MockState {
    balance: Decimal,
    prices: HashMap<String, Decimal>,
    scripts: HashMap<String, IssueScript>,
    issue_calls: Vec<IssueRequest>,
    auth_calls: u32,
    fail_auth: bool,
}

/// Scripted provider: set a balance and per-option wholesale prices,
/// optionally script failures per external id (default is Generated),
/// and inspect the calls afterwards. Balance decrements on success so
/// the balance-after snapshot is observable.
#[derive(Default)]
pub struct MockVoucherProvider {
    state: Mutex<MockState>,
}

impl MockVoucherProvider {
    pub fn new(balance: Decimal) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().balance = balance;
        mock
    }

    pub fn set_balance(&self, balance: Decimal) {
        self.state.lock().unwrap().balance = balance;
    }

    pub fn set_price(&self, option_code: &str, wholesale: Decimal) {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(option_code.to_string(), wholesale);
    }

    pub fn script_issue(&self, external_id: &str, script: IssueScript) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(external_id.to_string(), script);
    }

    pub fn fail_auth(&self, fail: bool) {
        self.state.lock().unwrap().fail_auth = fail;
    }

    pub fn issue_calls(&self) -> Vec<IssueRequest> {
        self.state.lock().unwrap().issue_calls.clone()
    }

    pub fn auth_calls(&self) -> u32 {
        self.state.lock().unwrap().auth_calls
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().unwrap().balance
    }
}

#[async_trait]
impl VoucherProvider for MockVoucherProvider {
    async fn authenticate(&self, _credentials: &ProviderCredentials) -> AppResult<ProviderSession> {
        let mut state = self.state.lock().unwrap();
        state.auth_calls += 1;
        if state.fail_auth {
            return Err(AppError::provider_auth("mock: credentials rejected"));
        }
        Ok(ProviderSession {
            token: format!("mock-token-{}", state.auth_calls),
            balance: state.balance,
        })
    }

    async fn option_pricing(
        &self,
        _session: &ProviderSession,
        option_code: &str,
    ) -> AppResult<OptionPricing> {
        let state = self.state.lock().unwrap();
        let wholesale = state.prices.get(option_code).copied().ok_or_else(|| {
            AppError::provider_transport(format!("mock: unknown option {option_code}"))
        })?;
        Ok(OptionPricing {
            min_face_value: Decimal::ONE,
            max_face_value: Decimal::from(1000),
            min_wholesale_value: wholesale,
            max_wholesale_value: wholesale,
            currency_code: "EUR".to_string(),
        })
    }

    async fn issue_voucher(
        &self,
        _session: &ProviderSession,
        request: &IssueRequest,
    ) -> AppResult<IssueOutcome> {
        let mut state = self.state.lock().unwrap();
        state.issue_calls.push(request.clone());

        let script = state
            .scripts
            .get(&request.external_id)
            .cloned()
            .unwrap_or(IssueScript::Generated);
        match script {
            IssueScript::Transport(message) => {
                Err(AppError::provider_transport(format!("mock: {message}")))
            }
            IssueScript::Business(message) => Ok(IssueOutcome {
                succeeded: false,
                error_message: Some(message),
                result: None,
            }),
            IssueScript::Generated => {
                let wholesale = state
                    .prices
                    .get(&request.option_code)
                    .copied()
                    .unwrap_or(Decimal::ONE);
                state.balance -= wholesale;
                Ok(IssueOutcome {
                    succeeded: true,
                    error_message: None,
                    result: Some(IssuedVoucher {
                        serial_number: format!("SN-{}", request.external_id),
                        reference: format!("REF-{}", request.external_id),
                        redeem_url: Some(format!(
                            "https://mock.example/redeem/{}",
                            request.external_id
                        )),
                        settled_amount: wholesale,
                        wholesale_amount: wholesale,
                        transaction_id: format!("TX-{}", request.external_id),
                        provider_transaction_id: format!("PTX-{}", request.external_id),
                    }),
                })
            }
        }
    }
}
