/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the upstream voucher provider API
    pub provider_base_url: String,
    /// Per-call timeout for upstream requests (ms)
    pub provider_timeout_ms: u64,
    /// Provider settlement currency; all order totals are kept in it
    pub settlement_currency: String,
    /// Pause after every N successful upstream transactions
    pub pacer_window: u32,
    /// Length of that pause (ms)
    pub pacer_pause_ms: u64,
    /// Maximum automatic re-attempts per voucher unit
    pub retry_cap: u32,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            provider_base_url: std::env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.voucher-provider.example".into()),
            provider_timeout_ms: std::env::var("PROVIDER_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30_000),
            settlement_currency: std::env::var("SETTLEMENT_CURRENCY")
                .unwrap_or_else(|_| "EUR".into()),
            pacer_window: std::env::var("PACER_WINDOW")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10),
            pacer_pause_ms: std::env::var("PACER_PAUSE_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1_000),
            retry_cap: std::env::var("VOUCHER_RETRY_CAP")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_contract() {
        let config = EngineConfig::from_env();
        assert_eq!(config.provider_timeout_ms, 30_000);
        assert_eq!(config.pacer_window, 10);
        assert_eq!(config.retry_cap, 3);
    }
}
