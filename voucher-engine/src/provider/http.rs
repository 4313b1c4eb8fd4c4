//! HTTP voucher provider client

use super::{
    IssueOutcome, IssueRequest, OptionPricing, ProviderCredentials, ProviderSession,
    VoucherProvider,
};
use crate::config::EngineConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use shared::{AppError, AppResult};
use std::time::Duration;
use tracing::debug;

/// Reqwest-backed provider client.
///
/// Non-2xx and connection-level failures map to transport errors so the
/// executor treats them as retryable; 401/403 on authenticate maps to an
/// auth error that aborts the whole confirm.
pub struct HttpVoucherProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVoucherProvider {
    pub fn new(config: &EngineConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.provider_timeout_ms))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> AppResult<T> {
        let url = self.url(path);
        debug!(%url, "Calling provider");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::provider_transport(format!("{path}: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::provider_auth(format!(
                "{path}: provider rejected credentials ({status})"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::provider_transport(format!(
                "{path}: HTTP {status}: {text}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::provider_transport(format!("{path}: invalid response: {e}")))
    }
}

#[async_trait]
impl VoucherProvider for HttpVoucherProvider {
    async fn authenticate(&self, credentials: &ProviderCredentials) -> AppResult<ProviderSession> {
        self.post_json(
            "auth/login",
            json!({
                "username": credentials.username,
                "password": credentials.password,
                "terminal_key": credentials.terminal_key,
            }),
        )
        .await
    }

    async fn option_pricing(
        &self,
        session: &ProviderSession,
        option_code: &str,
    ) -> AppResult<OptionPricing> {
        self.post_json(
            "catalog/option-pricing",
            json!({
                "token": session.token,
                "option_code": option_code,
            }),
        )
        .await
    }

    async fn issue_voucher(
        &self,
        session: &ProviderSession,
        request: &IssueRequest,
    ) -> AppResult<IssueOutcome> {
        self.post_json(
            "vouchers/issue",
            json!({
                "token": session.token,
                "external_id": request.external_id,
                "option_code": request.option_code,
                "face_amount": request.face_amount,
                "quantity": request.quantity,
            }),
        )
        .await
    }
}
